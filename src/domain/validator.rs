//! Field-level validation.
//!
//! A [`Validator`] collects at most one message per field. It is created
//! fresh for each request, filled by the `validate_*` functions of the
//! domain modules, and then either discarded or turned into a 422 response.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::hash::Hash;

/// Collects field-level validation failures.
///
/// The first failure recorded for a field wins; later checks against the
/// same field are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validator {
    errors: BTreeMap<String, String>,
}

impl Validator {
    /// Creates an empty validator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            errors: BTreeMap::new(),
        }
    }

    /// Returns `true` if no failure has been recorded.
    #[must_use]
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Records `message` under `field` unless the field already has one.
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_insert_with(|| message.into());
    }

    /// Records `message` under `field` when `ok` is false.
    pub fn check(&mut self, ok: bool, field: impl Into<String>, message: impl Into<String>) {
        if !ok {
            self.add_error(field, message);
        }
    }

    /// Returns the recorded failures.
    #[must_use]
    pub const fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    /// Consumes the validator, yielding the recorded failures.
    #[must_use]
    pub fn into_errors(self) -> BTreeMap<String, String> {
        self.errors
    }
}

/// Returns `true` if `value` is one of `permitted`.
#[must_use]
pub fn permitted_value<T: PartialEq + ?Sized>(value: &T, permitted: &[&T]) -> bool {
    permitted.iter().any(|candidate| *candidate == value)
}

/// Returns `true` if every element of `values` is distinct.
#[must_use]
pub fn unique<T: Eq + Hash>(values: &[T]) -> bool {
    let mut seen = HashSet::with_capacity(values.len());
    values.iter().all(|value| seen.insert(value))
}
