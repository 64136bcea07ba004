//! Router assembly.

use std::any::Any;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{self, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::{authenticate, require_activated_user};
use super::dto::MAX_BODY_BYTES;
use super::error::{ApiError, ApiErrorResponse, INTERNAL_ERROR_MESSAGE};
use super::handlers::{AppState, healthcheck, ping};
use super::notes::{
    create_note, create_user_note, delete_note, delete_user_note, latest_notes, list_notes,
    list_user_notes, show_note, show_user_note, update_note, update_user_note,
};
use super::tokens::create_authentication_token;
use super::users::{activate_user, register_user};

/// Builds the application router with all middleware applied.
///
/// `/v1` and `/v2` share the service and account routes; the note routes
/// under `/v2` additionally require an activated user.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new();
    for version in ["v1", "v2"] {
        router = router
            .route(&format!("/{version}/ping"), get(ping))
            .route(&format!("/{version}/healthcheck"), get(healthcheck))
            .route(&format!("/{version}/users"), post(register_user))
            .route(&format!("/{version}/users/activated"), put(activate_user))
            .route(
                &format!("/{version}/tokens/authentication"),
                post(create_authentication_token),
            );
    }

    let public_notes = Router::new()
        .route("/v1/notes", get(list_notes).post(create_note))
        .route("/v1/notes/latest", get(latest_notes))
        .route(
            "/v1/notes/{id}",
            get(show_note).patch(update_note).delete(delete_note),
        );

    let user_notes = Router::new()
        .route("/v2/notes", get(list_user_notes).post(create_user_note))
        .route(
            "/v2/notes/{id}",
            get(show_user_note)
                .patch(update_user_note)
                .delete(delete_user_note),
        )
        .route_layer(middleware::from_fn(require_activated_user));

    let cors = CorsLayer::new()
        .allow_origin(cors::Any)
        .allow_methods(cors::Any)
        .allow_headers(cors::Any);

    router
        .merge(public_notes)
        .merge(user_notes)
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> ApiErrorResponse {
    ApiErrorResponse::not_found()
}

async fn method_not_allowed(method: Method) -> ApiErrorResponse {
    ApiErrorResponse::method_not_allowed(&method)
}

/// Renders a handler panic as the 500 envelope and closes the connection.
fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    tracing::error!(panic = detail, "request handler panicked");

    let mut response = ApiErrorResponse::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        ApiError::new(INTERNAL_ERROR_MESSAGE),
    )
    .into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
