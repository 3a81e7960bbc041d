use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// Defines the routes exclusively accessible to staff users. These endpoints
/// provide oversight functions that ordinary members never need.
///
/// Access Control:
/// This router is nested under '/admin' behind the authentication middleware.
/// The staff requirement itself is enforced by the Access Policy inside the
/// service layer, so the rule stays testable without any HTTP plumbing.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/users?page=
        // Paginated listing of all accounts for administrative review.
        .route("/users", get(handlers::list_users))
}
