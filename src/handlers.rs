use crate::{
    AppState,
    auth::{AuthUser, OptionalAuthUser},
    error::{ApiError, ApiResult},
    models::{
        Attachment, Category, CategoryRequest, ChangePasswordRequest, Comment,
        CreateCommentRequest, CreatePostRequest, LikeResponse, LoginRequest, Page, Post,
        PostDetail, PostSummary, ProfileView, RegisterRequest, TokenResponse,
        UpdateCategoryRequest, UpdatePostRequest, UpdateProfileRequest,
    },
    service,
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

// --- Filter Structs ---

/// PostFilter
///
/// The accepted query parameters for the post listing endpoint (GET /posts).
/// Used by Axum's Query extractor to safely bind HTTP query parameters for
/// filtering, search, ordering and pagination.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct PostFilter {
    /// Restrict to posts in this category.
    pub category: Option<Uuid>,
    /// Restrict to posts by this author.
    pub author: Option<Uuid>,
    /// Restrict by visibility flag (anonymous callers are always restricted to
    /// public posts regardless of this).
    pub is_public: Option<bool>,
    /// Case-insensitive substring matched against title or content.
    pub search: Option<String>,
    /// One of created_at/views/title, with a '-' prefix for descending.
    pub ordering: Option<String>,
    /// 1-based page number.
    pub page: Option<i64>,
}

/// SearchQuery
///
/// Query parameters of GET /search. An absent or empty `q` yields an empty
/// result page.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub page: Option<i64>,
}

/// PageQuery
///
/// Bare pagination parameter for list endpoints without further filters.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct PageQuery {
    pub page: Option<i64>,
}

// --- Identity Handlers ---

/// register
///
/// [Public Route] Creates a new account. Password confirmation and strength
/// rules are enforced in the service layer; only a salted hash is stored.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = ProfileView),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<ProfileView>)> {
    let profile = service::register(state.repo.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// login
///
/// [Public Route] Verifies credentials and issues a bearer access token.
/// Unknown email and wrong password are indistinguishable in the response.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let tokens = service::login(state.repo.as_ref(), &state.config.jwt_secret, payload).await?;
    Ok(Json(tokens))
}

/// get_profile
///
/// [Authenticated Route] Returns the authenticated user's own profile.
#[utoipa::path(
    get,
    path = "/profile",
    responses((status = 200, description = "Profile", body = ProfileView))
)]
pub async fn get_profile(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<ProfileView>> {
    let profile = service::get_profile(state.repo.as_ref(), id).await?;
    Ok(Json(profile))
}

/// update_profile
///
/// [Authenticated Route] Partially updates the authenticated user's profile.
/// Email and identifier are read-only post-creation.
#[utoipa::path(
    put,
    path = "/profile",
    request_body = UpdateProfileRequest,
    responses((status = 200, description = "Updated", body = ProfileView))
)]
pub async fn update_profile(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<Json<ProfileView>> {
    let profile = service::update_profile(state.repo.as_ref(), id, payload).await?;
    Ok(Json(profile))
}

/// change_password
///
/// [Authenticated Route] Replaces the caller's password after verifying the
/// current one.
#[utoipa::path(
    post,
    path = "/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 401, description = "Current password incorrect")
    )
)]
pub async fn change_password(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    service::change_password(state.repo.as_ref(), id, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// list_users
///
/// [Admin Route] Paginated listing of all accounts.
#[utoipa::path(
    get,
    path = "/admin/users",
    params(PageQuery),
    responses(
        (status = 200, description = "Users", body = Page<ProfileView>),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn list_users(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<ProfileView>>> {
    let page = service::list_users(state.repo.as_ref(), &auth.actor(), query.page).await?;
    Ok(Json(page))
}

// --- Category Handlers ---

/// list_categories
///
/// [Public Route] Lists all categories, ordered by name.
#[utoipa::path(
    get,
    path = "/categories",
    responses((status = 200, description = "Categories", body = [Category]))
)]
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    let categories = service::list_categories(state.repo.as_ref()).await?;
    Ok(Json(categories))
}

/// create_category
///
/// [Admin Route] Creates a category. The admin check is a policy decision in
/// the service layer.
#[utoipa::path(
    post,
    path = "/categories",
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_category(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CategoryRequest>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let category = service::create_category(state.repo.as_ref(), &auth.actor(), payload).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// update_category
///
/// [Admin Route] Partially updates a category.
#[utoipa::path(
    put,
    path = "/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = UpdateCategoryRequest,
    responses((status = 200, description = "Updated", body = Category))
)]
pub async fn update_category(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> ApiResult<Json<Category>> {
    let category =
        service::update_category(state.repo.as_ref(), &auth.actor(), id, payload).await?;
    Ok(Json(category))
}

/// delete_category
///
/// [Admin Route] Deletes a category. Its posts are detached, not deleted.
#[utoipa::path(
    delete,
    path = "/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_category(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    service::delete_category(state.repo.as_ref(), &auth.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Post Handlers ---

/// list_posts
///
/// [Public Route] Lists posts with filtering, search, ordering and pagination.
///
/// *Security*: visibility filtering is applied inside the repository query,
/// before pagination. Anonymous callers only ever see public posts, while
/// authenticated callers additionally see their own private posts.
#[utoipa::path(
    get,
    path = "/posts",
    params(PostFilter),
    responses((status = 200, description = "Posts", body = Page<PostSummary>))
)]
pub async fn list_posts(
    auth: OptionalAuthUser,
    State(state): State<AppState>,
    Query(filter): Query<PostFilter>,
) -> ApiResult<Json<Page<PostSummary>>> {
    let page = service::list_posts(
        state.repo.as_ref(),
        &auth.actor(),
        service::PostListParams {
            category: filter.category,
            author: filter.author,
            is_public: filter.is_public,
            search: filter.search,
            ordering: filter.ordering,
            page: filter.page,
        },
    )
    .await?;
    Ok(Json(page))
}

/// get_post
///
/// [Public Route] Retrieves a single post's details. Each successful retrieval
/// increments the view counter by exactly one, and the caller sees the
/// incremented value. A private post is a 404 for everyone but its author.
#[utoipa::path(
    get,
    path = "/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = PostDetail),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_post(
    auth: OptionalAuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PostDetail>> {
    let detail = service::get_post(state.repo.as_ref(), &auth.actor(), id).await?;
    Ok(Json(detail))
}

/// create_post
///
/// [Authenticated Route] Submits a new post. The author is taken from the
/// authenticated session, never from the payload.
#[utoipa::path(
    post,
    path = "/posts",
    request_body = CreatePostRequest,
    responses((status = 201, description = "Created", body = Post))
)]
pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    let post = service::create_post(state.repo.as_ref(), &auth.actor(), payload).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// update_post
///
/// [Authenticated Route] Modifies a post under the ownership policy (author or
/// admin override).
#[utoipa::path(
    put,
    path = "/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = Post),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePostRequest>,
) -> ApiResult<Json<Post>> {
    let post = service::update_post(state.repo.as_ref(), &auth.actor(), id, payload).await?;
    Ok(Json(post))
}

/// delete_post
///
/// [Authenticated Route] Deletes a post along with its attachments, comments
/// and likes.
#[utoipa::path(
    delete,
    path = "/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    service::delete_post(
        state.repo.as_ref(),
        state.storage.as_ref(),
        &auth.actor(),
        id,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// toggle_like
///
/// [Authenticated Route] Flips the caller's membership in the post's like set
/// and returns the post-mutation state and count.
#[utoipa::path(
    post,
    path = "/posts/{id}/like",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Toggled", body = LikeResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn toggle_like(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<LikeResponse>> {
    let result = service::toggle_like(state.repo.as_ref(), &auth.actor(), id).await?;
    Ok(Json(result))
}

/// upload_attachment
///
/// [Authenticated Route] Accepts a multipart upload for a post the caller may
/// modify. File type and size limits are enforced against the actual bytes;
/// blob store and record insert form one logical unit.
#[utoipa::path(
    post,
    path = "/posts/{id}/upload_file",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 201, description = "Uploaded", body = Attachment),
        (status = 400, description = "Disallowed type or size")
    )
)]
pub async fn upload_attachment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Attachment>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("could not read multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::Validation("the file field needs a filename".to_string()))?;

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("could not read file bytes: {}", e)))?
            .to_vec();

        let attachment = service::upload_attachment(
            state.repo.as_ref(),
            state.storage.as_ref(),
            &auth.actor(),
            id,
            &original_name,
            bytes,
        )
        .await?;
        return Ok((StatusCode::CREATED, Json(attachment)));
    }

    Err(ApiError::Validation("a file field is required".to_string()))
}

/// search
///
/// [Public Route] Keyword search over public post titles. An empty query
/// returns an empty page rather than all posts.
#[utoipa::path(
    get,
    path = "/search",
    params(SearchQuery),
    responses((status = 200, description = "Matches", body = Page<PostSummary>))
)]
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Page<PostSummary>>> {
    let page = service::search(state.repo.as_ref(), query.q, query.page).await?;
    Ok(Json(page))
}

// --- Comment Handlers ---

/// list_comments
///
/// [Public Route] Lists a post's comments, oldest first. Visible to anyone who
/// can read the post.
#[utoipa::path(
    get,
    path = "/posts/{id}/comments",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Comments", body = [Comment]),
        (status = 404, description = "Not Found")
    )
)]
pub async fn list_comments(
    auth: OptionalAuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Comment>>> {
    let comments = service::list_comments(state.repo.as_ref(), &auth.actor(), id).await?;
    Ok(Json(comments))
}

/// add_comment
///
/// [Authenticated Route] Posts a new comment. Author and post are forced from
/// the session and the path.
#[utoipa::path(
    post,
    path = "/posts/{id}/comments",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 404, description = "Not Found")
    )
)]
pub async fn add_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let comment = service::add_comment(state.repo.as_ref(), &auth.actor(), id, payload).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
