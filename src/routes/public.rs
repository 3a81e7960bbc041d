use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are reachable **without authentication**. These
/// routes carry the read side of the API plus the identity gateway functions
/// (registration, login).
///
/// Security Mandate:
/// Read handlers in this module resolve the caller through `OptionalAuthUser`
/// and pass the resulting actor (possibly anonymous) into the service layer.
/// Visibility filtering happens server-side, in the repository queries and the
/// Access Policy, never post-hoc on fetched rows.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer checks.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // New account creation: confirmation, strength rules, unique email.
        .route("/register", post(handlers::register))
        // POST /login
        // Credential verification and access-token issuance.
        .route("/login", post(handlers::login))
        // GET /posts?category=&author=&is_public=&search=&ordering=&page=
        // Lists visible posts with filtering, search, ordering and pagination.
        // Anonymous callers are restricted to public posts inside the query.
        .route("/posts", get(handlers::list_posts))
        // GET /posts/{id}
        // Retrieves a single post's details and increments its view counter.
        // Private posts are a 404 for everyone but their author.
        .route("/posts/{id}", get(handlers::get_post))
        // GET /posts/{id}/comments
        // Lists the comments of a readable post, oldest first.
        .route("/posts/{id}/comments", get(handlers::list_comments))
        // GET /search?q=
        // Title-only keyword search over public posts. Empty query, empty page.
        .route("/search", get(handlers::search))
        // GET /categories
        // Lists the long-lived category reference data.
        .route("/categories", get(handlers::list_categories))
}
