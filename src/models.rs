use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The canonical identity record stored in the `users` table. This struct stays
/// internal to the crate: it carries the credential hash and is never serialized
/// to the wire. Callers see `ProfileView` projections instead.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: Uuid,
    // The login key. Unique, immutable after registration.
    pub email: String,
    pub username: String,
    pub phone: Option<String>,
    pub organization: Option<String>,
    // Blob-store key of the profile image, if any.
    pub profile_image: Option<String>,
    // Argon2 PHC string. Plaintext passwords are never persisted.
    pub password_hash: String,
    // Grants admin-manage rights (category management, user listing, overrides).
    pub is_staff: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category
///
/// Long-lived reference data for classifying posts. Created and edited only by
/// admins; deleting one detaches its posts rather than deleting them.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Post
///
/// A post row as stored. The author reference is required and immutable after
/// creation; the category is optional and survives category deletion as NULL.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author_id: Uuid,
    pub category_id: Option<Uuid>,
    // Monotonic view counter, incremented atomically in SQL.
    pub views: i64,
    pub is_public: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Attachment
///
/// A file attached to a post. The stored size is derived from the actual byte
/// length at save time, never from a caller-declared value. Cascade-deleted
/// with its post.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Attachment {
    pub id: Uuid,
    pub post_id: Uuid,
    // Blob-store reference.
    pub file_key: String,
    pub original_name: String,
    pub file_size: i64,
    #[ts(type = "string")]
    pub uploaded_at: DateTime<Utc>,
}

/// Comment
///
/// A comment row augmented with the author's display name (a join). Listed
/// ascending by creation time. Cascade-deleted with its post.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Comment {
    // BigInt (i64) for comment IDs due to the high volume potential.
    pub id: i64,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    // Loaded via a JOIN with `users` in the repository query.
    #[sqlx(default)]
    pub author_name: Option<String>,
}

/// Like
///
/// One row of the post/user like set. The composite primary key gives the
/// relation its set semantics: a user either has or hasn't liked a post.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Like {
    pub user_id: Uuid,
    pub post_id: Uuid,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for the public registration endpoint (POST /register).
/// `password2` is the confirmation field; the pair must match before any
/// strength rule is evaluated.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub password2: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
}

/// NewUser
///
/// The repository-facing insert shape produced from a validated registration.
/// Only the hash of the password survives to this point.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub phone: Option<String>,
    pub organization: Option<String>,
    pub password_hash: String,
}

/// LoginRequest
///
/// Input payload for POST /login. Email is the login key.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// TokenResponse
///
/// Output of a successful login: a signed bearer token for the Authorization
/// header.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TokenResponse {
    pub access: String,
    pub token_type: String,
}

/// ChangePasswordRequest
///
/// Input payload for POST /change-password. The old password must verify
/// against the stored hash; the new one is subject to registration strength
/// rules.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// UpdateProfileRequest
///
/// Partial update payload for the profile endpoint. Email and identifier are
/// read-only post-creation and deliberately absent here.
///
/// Uses `Option<T>` plus `#[serde(skip_serializing_if = "Option::is_none")]`
/// so only provided fields participate in the update.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

/// CreatePostRequest
///
/// Input payload for submitting a new post. The author is never part of the
/// payload: it is forced to the authenticated actor by the service layer.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: Option<Uuid>,
    // Defaults to public when omitted.
    #[serde(default)]
    pub is_public: Option<bool>,
}

/// UpdatePostRequest
///
/// Partial update payload for modifying an existing post. Author, views and
/// timestamps are immutable through this path.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

/// CreateCommentRequest
///
/// Input payload for posting a new comment. The post is taken from the path and
/// the author from the actor, regardless of anything in the payload.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub content: String,
}

/// CategoryRequest
///
/// Input payload for creating a category (admin only).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// UpdateCategoryRequest
///
/// Partial update payload for an existing category (admin only).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCategoryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// --- Output Projections ---

/// ProfileView
///
/// The outward projection of a user record. Deliberately omits the credential
/// hash and the active flag.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ProfileView {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub phone: Option<String>,
    pub organization: Option<String>,
    pub profile_image: Option<String>,
    pub is_staff: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<User> for ProfileView {
    fn from(user: User) -> Self {
        ProfileView {
            id: user.id,
            email: user.email,
            username: user.username,
            phone: user.phone,
            organization: user.organization,
            profile_image: user.profile_image,
            is_staff: user.is_staff,
            created_at: user.created_at,
        }
    }
}

/// PostSummary
///
/// The list/search projection of a post: joined author and category names plus
/// a comment count, without the body text or nested collections.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct PostSummary {
    pub id: Uuid,
    pub title: String,
    pub author_id: Uuid,
    pub author_name: String,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub views: i64,
    pub comment_count: i64,
    pub is_public: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// PostDetail
///
/// The detail projection of a post: full body plus nested attachments and
/// comments and the current like count. Assembled by the repository from the
/// head row and the two child queries.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostDetail {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author_id: Uuid,
    pub author_name: String,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub views: i64,
    pub is_public: bool,
    pub likes_count: i64,
    pub attachments: Vec<Attachment>,
    pub comments: Vec<Comment>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// PostDetailHead
///
/// Raw database row (internal use): the joined head of a post detail before
/// attachments and comments are attached.
#[derive(Debug, Clone, FromRow, Default)]
pub struct PostDetailHead {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author_id: Uuid,
    pub author_name: String,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub views: i64,
    pub is_public: bool,
    pub likes_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PostDetailHead {
    pub fn into_detail(self, attachments: Vec<Attachment>, comments: Vec<Comment>) -> PostDetail {
        PostDetail {
            id: self.id,
            title: self.title,
            content: self.content,
            author_id: self.author_id,
            author_name: self.author_name,
            category_id: self.category_id,
            category_name: self.category_name,
            views: self.views,
            is_public: self.is_public,
            likes_count: self.likes_count,
            attachments,
            comments,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// LikeResponse
///
/// Output of the like toggle: the actor's membership after the flip and the
/// post-mutation like count.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LikeResponse {
    pub liked: bool,
    pub likes_count: i64,
}

/// Page
///
/// Page-number pagination wrapper applied uniformly to paginated list
/// endpoints. `count` is the total number of matching rows, not the page
/// length.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Page<T> {
    pub count: i64,
    pub page: i64,
    pub page_size: i64,
    pub results: Vec<T>,
}

/// PostOrdering
///
/// The orderings accepted by the post list endpoint, parsed from the Django-style
/// `ordering` query parameter (`-` prefix for descending). Unknown values fall
/// back to the default rather than erroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostOrdering {
    CreatedAtAsc,
    #[default]
    CreatedAtDesc,
    ViewsAsc,
    ViewsDesc,
    TitleAsc,
    TitleDesc,
}

impl PostOrdering {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "created_at" => Some(PostOrdering::CreatedAtAsc),
            "-created_at" => Some(PostOrdering::CreatedAtDesc),
            "views" => Some(PostOrdering::ViewsAsc),
            "-views" => Some(PostOrdering::ViewsDesc),
            "title" => Some(PostOrdering::TitleAsc),
            "-title" => Some(PostOrdering::TitleDesc),
            _ => None,
        }
    }

    /// The ORDER BY clause body. Values are fixed strings from this whitelist,
    /// never caller input, so they are safe to splice into SQL.
    pub fn sql(&self) -> &'static str {
        match self {
            PostOrdering::CreatedAtAsc => "p.created_at ASC",
            PostOrdering::CreatedAtDesc => "p.created_at DESC",
            PostOrdering::ViewsAsc => "p.views ASC",
            PostOrdering::ViewsDesc => "p.views DESC",
            PostOrdering::TitleAsc => "p.title ASC",
            PostOrdering::TitleDesc => "p.title DESC",
        }
    }
}
