use uuid::Uuid;

use crate::{
    auth::issue_access_token,
    config::{ALLOWED_UPLOAD_EXTENSIONS, MAX_UPLOAD_BYTES, PAGE_SIZE},
    error::{ApiError, ApiResult},
    models::{
        Attachment, Category, CategoryRequest, ChangePasswordRequest, Comment,
        CreateCommentRequest, CreatePostRequest, LikeResponse, LoginRequest, NewUser, Page, Post,
        PostDetail, PostOrdering, PostSummary, ProfileView, RegisterRequest, TokenResponse,
        UpdateCategoryRequest, UpdatePostRequest, UpdateProfileRequest,
    },
    password::{hash_password, validate_password_strength, verify_password},
    policy::{Action, Actor, can_perform},
    repository::{PostListQuery, Repository},
    storage::StorageService,
};

// The service layer: orchestration of Identity and Post operations against the
// Repository, with the Access Policy applied on every path and all side
// effects (view increment, like toggle, attachment persistence) sequenced
// here. Handlers stay thin adapters; nothing in this module knows about HTTP.

// --- Shared helpers ---

/// Resolves a post and applies the read policy. A post the actor may not read
/// is reported exactly like a missing one, so the existence of private posts
/// never leaks.
async fn readable_post(repo: &dyn Repository, actor: &Actor, id: Uuid) -> ApiResult<Post> {
    let post = repo.get_post(id).await?.ok_or_else(post_not_found)?;
    if !can_perform(actor, Action::Read, Some(&post)) {
        return Err(post_not_found());
    }
    Ok(post)
}

/// Resolves a post through the read policy, then requires mutation rights.
/// Readable-but-not-owned yields a permission error; unreadable stays a 404.
async fn modifiable_post(repo: &dyn Repository, actor: &Actor, id: Uuid) -> ApiResult<Post> {
    let post = readable_post(repo, actor, id).await?;
    if !can_perform(actor, Action::Update, Some(&post)) {
        return Err(ApiError::Permission(
            "only the author may modify this post".to_string(),
        ));
    }
    Ok(post)
}

fn post_not_found() -> ApiError {
    ApiError::NotFound("post not found".to_string())
}

fn clamp_page(page: Option<i64>) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    (page, (page - 1) * PAGE_SIZE)
}

fn require_admin(actor: &Actor) -> ApiResult<()> {
    if !can_perform(actor, Action::AdminManage, None) {
        return Err(ApiError::Permission(
            "administrator rights required".to_string(),
        ));
    }
    Ok(())
}

/// Maps a unique-constraint violation onto a caller-facing validation error,
/// letting everything else propagate as a server fault.
fn map_unique_violation(e: sqlx::Error, message: &str) -> ApiError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ApiError::Validation(message.to_string())
        }
        _ => ApiError::from(e),
    }
}

// --- Identity operations ---

/// Registers a new account. Confirmation and strength rules run before any
/// write; only the argon2 hash of the password is stored. The unique-email
/// invariant is enforced both by the pre-check and by the database constraint,
/// so a racing duplicate still surfaces as a validation error.
pub async fn register(repo: &dyn Repository, req: RegisterRequest) -> ApiResult<ProfileView> {
    if req.email.trim().is_empty() || !req.email.contains('@') {
        return Err(ApiError::Validation(
            "a valid email address is required".to_string(),
        ));
    }
    if req.username.trim().is_empty() {
        return Err(ApiError::Validation("a username is required".to_string()));
    }
    if req.password != req.password2 {
        return Err(ApiError::Validation("passwords do not match".to_string()));
    }
    validate_password_strength(&req.password, &req.email, &req.username)?;

    if repo.get_user_by_email(&req.email).await?.is_some() {
        return Err(ApiError::Validation(
            "an account with this email already exists".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password)?;
    let user = repo
        .create_user(NewUser {
            email: req.email,
            username: req.username,
            phone: req.phone,
            organization: req.organization,
            password_hash,
        })
        .await
        .map_err(|e| map_unique_violation(e, "an account with this email already exists"))?;

    Ok(ProfileView::from(user))
}

/// Verifies credentials and issues an access token. Unknown email, wrong
/// password and deactivated accounts are deliberately indistinguishable.
pub async fn login(
    repo: &dyn Repository,
    jwt_secret: &str,
    req: LoginRequest,
) -> ApiResult<TokenResponse> {
    let invalid = || ApiError::Auth("invalid email or password".to_string());

    let user = repo.get_user_by_email(&req.email).await?.ok_or_else(invalid)?;
    if !verify_password(&req.password, &user.password_hash) || !user.is_active {
        return Err(invalid());
    }

    let access = issue_access_token(user.id, jwt_secret)?;
    Ok(TokenResponse {
        access,
        token_type: "Bearer".to_string(),
    })
}

pub async fn get_profile(repo: &dyn Repository, user_id: Uuid) -> ApiResult<ProfileView> {
    let user = repo
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;
    Ok(ProfileView::from(user))
}

/// Updates the mutable profile fields. Email and identifier are read-only
/// post-creation; the request type cannot even express them.
pub async fn update_profile(
    repo: &dyn Repository,
    user_id: Uuid,
    req: UpdateProfileRequest,
) -> ApiResult<ProfileView> {
    if let Some(username) = &req.username {
        if username.trim().is_empty() {
            return Err(ApiError::Validation("username cannot be blank".to_string()));
        }
    }
    let user = repo
        .update_profile(user_id, req)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;
    Ok(ProfileView::from(user))
}

/// Replaces the stored credential after verifying the old password. The new
/// password runs through the same strength rules as registration.
pub async fn change_password(
    repo: &dyn Repository,
    user_id: Uuid,
    req: ChangePasswordRequest,
) -> ApiResult<()> {
    let user = repo
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    if !verify_password(&req.old_password, &user.password_hash) {
        return Err(ApiError::Auth(
            "current password is incorrect".to_string(),
        ));
    }

    validate_password_strength(&req.new_password, &user.email, &user.username)?;
    let hash = hash_password(&req.new_password)?;
    repo.set_password_hash(user_id, &hash).await?;
    Ok(())
}

/// Admin-only paginated user listing.
pub async fn list_users(
    repo: &dyn Repository,
    actor: &Actor,
    page: Option<i64>,
) -> ApiResult<Page<ProfileView>> {
    require_admin(actor)?;
    let (page, offset) = clamp_page(page);
    let (users, count) = repo.list_users(PAGE_SIZE, offset).await?;
    Ok(Page {
        count,
        page,
        page_size: PAGE_SIZE,
        results: users.into_iter().map(ProfileView::from).collect(),
    })
}

// --- Category operations ---

pub async fn list_categories(repo: &dyn Repository) -> ApiResult<Vec<Category>> {
    Ok(repo.list_categories().await?)
}

pub async fn create_category(
    repo: &dyn Repository,
    actor: &Actor,
    req: CategoryRequest,
) -> ApiResult<Category> {
    require_admin(actor)?;
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation(
            "category name is required".to_string(),
        ));
    }
    repo.create_category(req)
        .await
        .map_err(|e| map_unique_violation(e, "a category with this name already exists"))
}

pub async fn update_category(
    repo: &dyn Repository,
    actor: &Actor,
    id: Uuid,
    req: UpdateCategoryRequest,
) -> ApiResult<Category> {
    require_admin(actor)?;
    repo.update_category(id, req)
        .await
        .map_err(|e| map_unique_violation(e, "a category with this name already exists"))?
        .ok_or_else(|| ApiError::NotFound("category not found".to_string()))
}

pub async fn delete_category(repo: &dyn Repository, actor: &Actor, id: Uuid) -> ApiResult<()> {
    require_admin(actor)?;
    if !repo.delete_category(id).await? {
        return Err(ApiError::NotFound("category not found".to_string()));
    }
    Ok(())
}

// --- Post operations ---

/// Query inputs of the post listing, as resolved by the handler.
#[derive(Debug, Clone, Default)]
pub struct PostListParams {
    pub category: Option<Uuid>,
    pub author: Option<Uuid>,
    pub is_public: Option<bool>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<i64>,
}

/// Lists posts visible to the actor. The visibility restriction is part of the
/// query itself and applies before pagination, so anonymous callers can never
/// page into private rows.
pub async fn list_posts(
    repo: &dyn Repository,
    actor: &Actor,
    params: PostListParams,
) -> ApiResult<Page<PostSummary>> {
    let (page, offset) = clamp_page(params.page);
    let ordering = params
        .ordering
        .as_deref()
        .and_then(PostOrdering::parse)
        .unwrap_or_default();

    let (posts, count) = repo
        .list_posts(PostListQuery {
            viewer: actor.id(),
            category: params.category,
            author: params.author,
            is_public: params.is_public,
            search: params.search.filter(|s| !s.trim().is_empty()),
            ordering,
            limit: PAGE_SIZE,
            offset,
        })
        .await?;

    Ok(Page {
        count,
        page,
        page_size: PAGE_SIZE,
        results: posts,
    })
}

/// Retrieves a post detail. On success the view counter is incremented first
/// (atomically, in the store) and the projection is computed afterwards, so the
/// caller sees the incremented value.
pub async fn get_post(repo: &dyn Repository, actor: &Actor, id: Uuid) -> ApiResult<PostDetail> {
    readable_post(repo, actor, id).await?;
    repo.increment_views(id).await?.ok_or_else(post_not_found)?;
    repo.get_post_detail(id).await?.ok_or_else(post_not_found)
}

/// Creates a post. The author is always the actor; it cannot be supplied by
/// the caller.
pub async fn create_post(
    repo: &dyn Repository,
    actor: &Actor,
    req: CreatePostRequest,
) -> ApiResult<Post> {
    if !can_perform(actor, Action::Create, None) {
        return Err(ApiError::Auth("authentication required".to_string()));
    }
    let author_id = actor.id().expect("authenticated actor has an id");

    if req.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".to_string()));
    }
    if req.content.trim().is_empty() {
        return Err(ApiError::Validation("content is required".to_string()));
    }
    if let Some(category) = req.category {
        if repo.get_category(category).await?.is_none() {
            return Err(ApiError::Validation("unknown category".to_string()));
        }
    }

    Ok(repo.create_post(author_id, req).await?)
}

/// Updates a post under the ownership policy. Author, views and timestamps are
/// immutable through this path.
pub async fn update_post(
    repo: &dyn Repository,
    actor: &Actor,
    id: Uuid,
    req: UpdatePostRequest,
) -> ApiResult<Post> {
    modifiable_post(repo, actor, id).await?;

    if let Some(title) = &req.title {
        if title.trim().is_empty() {
            return Err(ApiError::Validation("title cannot be blank".to_string()));
        }
    }
    if let Some(category) = req.category {
        if repo.get_category(category).await?.is_none() {
            return Err(ApiError::Validation("unknown category".to_string()));
        }
    }

    repo.update_post(id, req).await?.ok_or_else(post_not_found)
}

/// Deletes a post and everything hanging off it. The repository removes likes,
/// comments and attachment rows in one transaction and hands back the
/// attachment keys; the blobs are removed afterwards, best-effort, since the
/// database is the source of truth.
pub async fn delete_post(
    repo: &dyn Repository,
    storage: &dyn StorageService,
    actor: &Actor,
    id: Uuid,
) -> ApiResult<()> {
    modifiable_post(repo, actor, id).await?;

    let file_keys = repo.delete_post(id).await?.ok_or_else(post_not_found)?;
    for key in file_keys {
        if let Err(e) = storage.delete(&key).await {
            tracing::warn!("failed to delete orphaned blob '{}': {}", key, e);
        }
    }
    Ok(())
}

/// Flips the actor's membership in the post's like set and reports the
/// post-mutation state. Each call is exactly one flip: the conditional insert
/// and the fallback delete are both single atomic statements, so concurrent
/// calls from the same actor cannot double-count.
pub async fn toggle_like(
    repo: &dyn Repository,
    actor: &Actor,
    post_id: Uuid,
) -> ApiResult<LikeResponse> {
    let post = readable_post(repo, actor, post_id).await?;
    if !can_perform(actor, Action::Like, Some(&post)) {
        return Err(ApiError::Auth("authentication required".to_string()));
    }
    let user_id = actor.id().expect("authenticated actor has an id");

    let liked = if repo.insert_like(post_id, user_id).await? {
        true
    } else {
        // Already a member: this call removes the like.
        repo.remove_like(post_id, user_id).await?;
        false
    };

    let likes_count = repo.count_likes(post_id).await?;
    Ok(LikeResponse { liked, likes_count })
}

/// Validates and persists an attachment. The stored size comes from the actual
/// byte length. Blob store and record insert form one logical unit: if the
/// insert fails, the just-written blob is removed again.
pub async fn upload_attachment(
    repo: &dyn Repository,
    storage: &dyn StorageService,
    actor: &Actor,
    post_id: Uuid,
    original_name: &str,
    bytes: Vec<u8>,
) -> ApiResult<Attachment> {
    let post = readable_post(repo, actor, post_id).await?;
    if !can_perform(actor, Action::Upload, Some(&post)) {
        return Err(ApiError::Permission(
            "only the author may attach files to this post".to_string(),
        ));
    }

    let extension = original_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    if !ALLOWED_UPLOAD_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ApiError::Validation(format!(
            "file type not allowed. allowed extensions: {}",
            ALLOWED_UPLOAD_EXTENSIONS.join(", ")
        )));
    }

    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::Validation(format!(
            "file is too large (maximum {} MiB)",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }

    let file_size = bytes.len() as i64;
    let file_key = format!("attachments/{}.{}", Uuid::new_v4(), extension);

    storage
        .store(&file_key, bytes)
        .await
        .map_err(ApiError::Internal)?;

    match repo
        .create_attachment(post_id, &file_key, original_name, file_size)
        .await
    {
        Ok(attachment) => Ok(attachment),
        Err(e) => {
            // Roll the blob back so no stored file exists without its record.
            if let Err(cleanup) = storage.delete(&file_key).await {
                tracing::warn!(
                    "failed to roll back blob '{}' after insert failure: {}",
                    file_key,
                    cleanup
                );
            }
            Err(ApiError::from(e))
        }
    }
}

/// Keyword search over public post titles. An empty query is an empty result,
/// not a full listing.
pub async fn search(
    repo: &dyn Repository,
    query: Option<String>,
    page: Option<i64>,
) -> ApiResult<Page<PostSummary>> {
    let (page, offset) = clamp_page(page);

    let query = query.unwrap_or_default();
    let query = query.trim();
    if query.is_empty() {
        return Ok(Page {
            count: 0,
            page,
            page_size: PAGE_SIZE,
            results: Vec::new(),
        });
    }

    let (posts, count) = repo.search_posts(query, PAGE_SIZE, offset).await?;
    Ok(Page {
        count,
        page,
        page_size: PAGE_SIZE,
        results: posts,
    })
}

// --- Comment operations ---

/// Lists a post's comments, ascending by creation time. Readable by anyone who
/// can read the post.
pub async fn list_comments(
    repo: &dyn Repository,
    actor: &Actor,
    post_id: Uuid,
) -> ApiResult<Vec<Comment>> {
    readable_post(repo, actor, post_id).await?;
    Ok(repo.get_comments(post_id).await?)
}

/// Creates a comment. The author is the actor and the post is the path
/// parameter, regardless of anything in the payload.
pub async fn add_comment(
    repo: &dyn Repository,
    actor: &Actor,
    post_id: Uuid,
    req: CreateCommentRequest,
) -> ApiResult<Comment> {
    let post = readable_post(repo, actor, post_id).await?;
    if !can_perform(actor, Action::Create, Some(&post)) {
        return Err(ApiError::Auth("authentication required".to_string()));
    }
    let author_id = actor.id().expect("authenticated actor has an id");

    if req.content.trim().is_empty() {
        return Err(ApiError::Validation("content is required".to_string()));
    }

    Ok(repo.add_comment(post_id, author_id, &req.content).await?)
}
