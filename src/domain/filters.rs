//! Listing filters: page, page size and sort order.
//!
//! The sort value is matched against a per-endpoint safelist before it is
//! allowed anywhere near a query. A leading `-` selects descending order.

use serde::Serialize;

use super::validator::{Validator, permitted_value};

pub const MAX_PAGE: u32 = 10_000_000;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Sort values accepted by the note listing endpoints.
pub const NOTE_SORT_SAFELIST: &[&str] = &[
    "id",
    "title",
    "created_at",
    "last_updated_at",
    "-id",
    "-title",
    "-created_at",
    "-last_updated_at",
];

/// Ordering direction for SQL `ORDER BY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Page, page size and sort for a listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    /// 1-indexed page number.
    pub page: u32,
    pub page_size: u32,
    pub sort: String,
    pub sort_safelist: &'static [&'static str],
}

impl Filters {
    /// Creates filters with the given values and safelist.
    #[must_use]
    pub fn new(
        page: u32,
        page_size: u32,
        sort: impl Into<String>,
        sort_safelist: &'static [&'static str],
    ) -> Self {
        Self {
            page,
            page_size,
            sort: sort.into(),
            sort_safelist,
        }
    }

    /// Default note listing filters: first page, 20 per page, by id.
    #[must_use]
    pub fn for_notes() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE, "id", NOTE_SORT_SAFELIST)
    }

    /// Column name behind the sort value, if the stripped name is safelisted.
    #[must_use]
    pub fn sort_column(&self) -> Option<&str> {
        let column = self.sort.strip_prefix('-').unwrap_or(&self.sort);
        permitted_value(column, self.sort_safelist).then_some(column)
    }

    #[must_use]
    pub fn sort_direction(&self) -> SortDirection {
        if self.sort.starts_with('-') {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        }
    }

    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.page_size
    }

    /// Row offset of the first item on the page.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page.saturating_sub(1) as u64) * self.page_size as u64
    }
}

/// Checks page, page size and sort against their bounds and safelist.
pub fn validate_filters(validator: &mut Validator, filters: &Filters) {
    validator.check(filters.page > 0, "page", "must be greater than zero");
    validator.check(
        filters.page <= MAX_PAGE,
        "page",
        "must be a maximum of 10 million",
    );
    validator.check(filters.page_size > 0, "page_size", "must be greater than zero");
    validator.check(
        filters.page_size <= MAX_PAGE_SIZE,
        "page_size",
        "must be a maximum of 100",
    );
    validator.check(
        permitted_value(filters.sort.as_str(), filters.sort_safelist),
        "sort",
        "invalid sort value",
    );
}

// =============================================================================
// Paginated Result
// =============================================================================

/// One page of a listing plus the total number of matching records.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total_records: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> PaginatedResult<T> {
    #[must_use]
    pub const fn new(items: Vec<T>, total_records: u64, page: u32, page_size: u32) -> Self {
        Self {
            items,
            total_records,
            page,
            page_size,
        }
    }

    /// Pagination metadata for the response envelope.
    #[must_use]
    pub fn metadata(&self) -> Metadata {
        Metadata::calculate(self.total_records, self.page, self.page_size)
    }
}

/// Pagination metadata. Serializes to `{}` when there are no records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_records: Option<u64>,
}

impl Metadata {
    #[must_use]
    pub fn calculate(total_records: u64, page: u32, page_size: u32) -> Self {
        if total_records == 0 || page_size == 0 {
            return Self::default();
        }

        Self {
            current_page: Some(page),
            page_size: Some(page_size),
            first_page: Some(1),
            last_page: Some(total_records.div_ceil(u64::from(page_size))),
            total_records: Some(total_records),
        }
    }
}
