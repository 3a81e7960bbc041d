use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Authenticated Router Module
///
/// Defines the routes accessible to any user who has successfully passed the
/// authentication layer: profile management, post submission and mutation,
/// liking, commenting and file upload.
///
/// Access Control Strategy:
/// Every handler in this module relies on the `AuthUser` extractor middleware
/// being present on the router layer above this module. This guarantees that
/// handlers receive a validated identity, which the service layer then feeds
/// into the Access Policy for all ownership and role checks.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Profile & Credentials ---
        // GET/PUT/PATCH /profile
        // The caller's own profile. Email and identifier are read-only.
        .route(
            "/profile",
            get(handlers::get_profile)
                .put(handlers::update_profile)
                .patch(handlers::update_profile),
        )
        // POST /change-password
        // Verifies the current password before storing a new hash.
        .route("/change-password", post(handlers::change_password))
        // --- Posts ---
        // POST /posts
        // Submits a new post. The author is forced to the session identity.
        .route("/posts", post(handlers::create_post))
        // PUT/PATCH/DELETE /posts/{id}
        // Post mutation under the ownership policy (author or admin override).
        // Deletion cascades to attachments, comments and likes explicitly.
        .route(
            "/posts/{id}",
            put(handlers::update_post)
                .patch(handlers::update_post)
                .delete(handlers::delete_post),
        )
        // POST /posts/{id}/like
        // Toggles the caller's like. Set semantics make each call one flip.
        .route("/posts/{id}/like", post(handlers::toggle_like))
        // POST /posts/{id}/upload_file
        // Multipart attachment upload with extension and size validation.
        .route("/posts/{id}/upload_file", post(handlers::upload_attachment))
        // --- Comments ---
        // POST /posts/{id}/comments
        // Posts a new comment on a readable post.
        .route("/posts/{id}/comments", post(handlers::add_comment))
        // --- Categories (admin-gated in the service layer) ---
        // POST /categories, PUT/DELETE /categories/{id}
        // Category management. The staff check is a policy decision, mirroring
        // how the service layer guards every other privileged operation.
        .route("/categories", post(handlers::create_category))
        .route(
            "/categories/{id}",
            put(handlers::update_category).delete(handlers::delete_category),
        )
}
