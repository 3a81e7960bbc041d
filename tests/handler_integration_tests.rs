use async_trait::async_trait;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use community_board::{
    AppState,
    auth::{AuthUser, OptionalAuthUser},
    config::AppConfig,
    error::ApiError,
    handlers,
    models::{
        Attachment, Category, CategoryRequest, Comment, CreateCommentRequest, CreatePostRequest,
        LikeResponse, NewUser, Page, Post, PostDetail, PostSummary, ProfileView, RegisterRequest,
        UpdateCategoryRequest, UpdatePostRequest, UpdateProfileRequest, User,
    },
    repository::{PostListQuery, Repository},
    storage::MockStorageService,
};
use std::sync::Arc;
use tokio::test;
use uuid::Uuid;

// --- MOCK REPOSITORY IMPLEMENTATION ---

// The central control point for testing handler logic: handlers rely on the
// Repository trait, so the mock is configured per test with the rows each
// scenario needs.
pub struct MockRepoControl {
    pub user_to_return: Option<User>,
    pub post_to_return: Option<Post>,
    pub detail_to_return: Option<PostDetail>,
    pub summaries_to_return: Vec<PostSummary>,
    pub users_to_return: Vec<User>,
    pub comments_to_return: Vec<Comment>,
    pub categories_to_return: Vec<Category>,
    pub insert_like_result: bool,
    pub likes_count: i64,
    pub delete_post_keys: Option<Vec<String>>,
}

impl Default for MockRepoControl {
    fn default() -> Self {
        MockRepoControl {
            user_to_return: None,
            post_to_return: None,
            detail_to_return: None,
            summaries_to_return: vec![],
            users_to_return: vec![],
            comments_to_return: vec![],
            categories_to_return: vec![],
            insert_like_result: true,
            likes_count: 1,
            delete_post_keys: Some(vec![]),
        }
    }
}

#[async_trait]
impl Repository for MockRepoControl {
    async fn create_user(&self, _user: NewUser) -> Result<User, sqlx::Error> {
        Ok(User::default())
    }
    async fn get_user(&self, _id: Uuid) -> Result<Option<User>, sqlx::Error> {
        Ok(self.user_to_return.clone())
    }
    async fn get_user_by_email(&self, _email: &str) -> Result<Option<User>, sqlx::Error> {
        Ok(self.user_to_return.clone())
    }
    async fn update_profile(
        &self,
        _id: Uuid,
        _req: UpdateProfileRequest,
    ) -> Result<Option<User>, sqlx::Error> {
        Ok(self.user_to_return.clone())
    }
    async fn set_password_hash(&self, _id: Uuid, _hash: &str) -> Result<bool, sqlx::Error> {
        Ok(true)
    }
    async fn list_users(
        &self,
        _limit: i64,
        _offset: i64,
    ) -> Result<(Vec<User>, i64), sqlx::Error> {
        Ok((
            self.users_to_return.clone(),
            self.users_to_return.len() as i64,
        ))
    }
    async fn list_categories(&self) -> Result<Vec<Category>, sqlx::Error> {
        Ok(self.categories_to_return.clone())
    }
    async fn get_category(&self, _id: Uuid) -> Result<Option<Category>, sqlx::Error> {
        Ok(self.categories_to_return.first().cloned())
    }
    async fn create_category(&self, _req: CategoryRequest) -> Result<Category, sqlx::Error> {
        Ok(self.categories_to_return.first().cloned().unwrap_or_default())
    }
    async fn update_category(
        &self,
        _id: Uuid,
        _req: UpdateCategoryRequest,
    ) -> Result<Option<Category>, sqlx::Error> {
        Ok(self.categories_to_return.first().cloned())
    }
    async fn delete_category(&self, _id: Uuid) -> Result<bool, sqlx::Error> {
        Ok(!self.categories_to_return.is_empty())
    }
    async fn list_posts(
        &self,
        _q: PostListQuery,
    ) -> Result<(Vec<PostSummary>, i64), sqlx::Error> {
        Ok((
            self.summaries_to_return.clone(),
            self.summaries_to_return.len() as i64,
        ))
    }
    async fn get_post(&self, _id: Uuid) -> Result<Option<Post>, sqlx::Error> {
        Ok(self.post_to_return.clone())
    }
    async fn get_post_detail(&self, _id: Uuid) -> Result<Option<PostDetail>, sqlx::Error> {
        Ok(self.detail_to_return.clone())
    }
    async fn increment_views(&self, _id: Uuid) -> Result<Option<i64>, sqlx::Error> {
        Ok(self.post_to_return.as_ref().map(|p| p.views + 1))
    }
    async fn create_post(
        &self,
        author_id: Uuid,
        req: CreatePostRequest,
    ) -> Result<Post, sqlx::Error> {
        Ok(Post {
            id: Uuid::new_v4(),
            title: req.title,
            content: req.content,
            author_id,
            is_public: req.is_public.unwrap_or(true),
            ..Post::default()
        })
    }
    async fn update_post(
        &self,
        _id: Uuid,
        _req: UpdatePostRequest,
    ) -> Result<Option<Post>, sqlx::Error> {
        Ok(self.post_to_return.clone())
    }
    async fn delete_post(&self, _id: Uuid) -> Result<Option<Vec<String>>, sqlx::Error> {
        Ok(self.delete_post_keys.clone())
    }
    async fn insert_like(&self, _post_id: Uuid, _user_id: Uuid) -> Result<bool, sqlx::Error> {
        Ok(self.insert_like_result)
    }
    async fn remove_like(&self, _post_id: Uuid, _user_id: Uuid) -> Result<bool, sqlx::Error> {
        Ok(true)
    }
    async fn count_likes(&self, _post_id: Uuid) -> Result<i64, sqlx::Error> {
        Ok(self.likes_count)
    }
    async fn search_posts(
        &self,
        _query: &str,
        _limit: i64,
        _offset: i64,
    ) -> Result<(Vec<PostSummary>, i64), sqlx::Error> {
        Ok((
            self.summaries_to_return.clone(),
            self.summaries_to_return.len() as i64,
        ))
    }
    async fn create_attachment(
        &self,
        post_id: Uuid,
        file_key: &str,
        original_name: &str,
        file_size: i64,
    ) -> Result<Attachment, sqlx::Error> {
        Ok(Attachment {
            id: Uuid::new_v4(),
            post_id,
            file_key: file_key.to_string(),
            original_name: original_name.to_string(),
            file_size,
            ..Attachment::default()
        })
    }
    async fn list_attachments(&self, _post_id: Uuid) -> Result<Vec<Attachment>, sqlx::Error> {
        Ok(vec![])
    }
    async fn add_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        content: &str,
    ) -> Result<Comment, sqlx::Error> {
        Ok(Comment {
            id: 1,
            post_id,
            author_id,
            content: content.to_string(),
            ..Comment::default()
        })
    }
    async fn get_comments(&self, _post_id: Uuid) -> Result<Vec<Comment>, sqlx::Error> {
        Ok(self.comments_to_return.clone())
    }
}

// --- Test Scaffolding ---

const TEST_ID: Uuid = Uuid::from_u128(1);
const TEST_ADMIN_ID: Uuid = Uuid::from_u128(2);

fn create_test_state(repo_control: MockRepoControl) -> AppState {
    AppState {
        repo: Arc::new(repo_control),
        storage: Arc::new(MockStorageService::new()),
        config: AppConfig::default(),
    }
}

fn admin_user() -> AuthUser {
    AuthUser {
        id: TEST_ADMIN_ID,
        is_staff: true,
    }
}

fn member_user() -> AuthUser {
    AuthUser {
        id: TEST_ID,
        is_staff: false,
    }
}

fn anonymous() -> OptionalAuthUser {
    OptionalAuthUser(None)
}

fn public_post(author: Uuid) -> Post {
    Post {
        id: Uuid::from_u128(10),
        title: "Visible".to_string(),
        content: "body".to_string(),
        author_id: author,
        is_public: true,
        ..Post::default()
    }
}

fn detail_for(post: &Post, views: i64) -> PostDetail {
    PostDetail {
        id: post.id,
        title: post.title.clone(),
        content: post.content.clone(),
        author_id: post.author_id,
        author_name: "author".to_string(),
        views,
        is_public: post.is_public,
        ..PostDetail::default()
    }
}

/// Renders an ApiError the way the router would and returns (status, error kind).
async fn error_response(err: ApiError) -> (StatusCode, String) {
    let response = err.into_response();
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (parts.status, json["error"].as_str().unwrap().to_string())
}

// --- HANDLER TESTS ---

#[test]
async fn test_get_post_details_success() {
    let post = public_post(TEST_ID);
    let state = create_test_state(MockRepoControl {
        post_to_return: Some(post.clone()),
        detail_to_return: Some(detail_for(&post, 5)),
        ..MockRepoControl::default()
    });

    let result = handlers::get_post(anonymous(), State(state), Path(post.id)).await;

    assert!(result.is_ok());
    let Json(detail) = result.unwrap();
    assert_eq!(detail.id, post.id);
    assert_eq!(detail.views, 5);
}

#[test]
async fn test_get_post_not_found() {
    let state = create_test_state(MockRepoControl {
        post_to_return: None,
        ..MockRepoControl::default()
    });

    let result = handlers::get_post(anonymous(), State(state), Path(Uuid::new_v4())).await;

    let (status, kind) = error_response(result.unwrap_err()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(kind, "not_found");
}

#[test]
async fn test_get_private_post_hidden_from_strangers() {
    let author = Uuid::from_u128(42);
    let mut post = public_post(author);
    post.is_public = false;
    let state = create_test_state(MockRepoControl {
        post_to_return: Some(post.clone()),
        detail_to_return: Some(detail_for(&post, 1)),
        ..MockRepoControl::default()
    });

    // An authenticated non-author is told the post does not exist.
    let result = handlers::get_post(
        OptionalAuthUser(Some(member_user())),
        State(state),
        Path(post.id),
    )
    .await;

    let (status, kind) = error_response(result.unwrap_err()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(kind, "not_found");
}

#[test]
async fn test_register_password_mismatch_is_a_structured_validation_error() {
    let state = create_test_state(MockRepoControl::default());

    let payload = RegisterRequest {
        email: "jane@example.com".to_string(),
        username: "jane".to_string(),
        password: "rust and relations".to_string(),
        password2: "something else".to_string(),
        phone: None,
        organization: None,
    };

    let result = handlers::register(State(state), Json(payload)).await;

    let (status, kind) = error_response(result.unwrap_err()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(kind, "validation_error");
}

#[test]
async fn test_toggle_like_returns_membership_and_count() {
    let post = public_post(Uuid::from_u128(42));
    let state = create_test_state(MockRepoControl {
        post_to_return: Some(post.clone()),
        insert_like_result: true,
        likes_count: 3,
        ..MockRepoControl::default()
    });

    let result = handlers::toggle_like(member_user(), State(state), Path(post.id)).await;

    assert!(result.is_ok());
    let Json(LikeResponse { liked, likes_count }) = result.unwrap();
    assert!(liked);
    assert_eq!(likes_count, 3);
}

#[test]
async fn test_delete_post_success() {
    let post = public_post(TEST_ID);
    let state = create_test_state(MockRepoControl {
        post_to_return: Some(post.clone()),
        delete_post_keys: Some(vec!["attachments/a.png".to_string()]),
        ..MockRepoControl::default()
    });

    let result = handlers::delete_post(member_user(), State(state), Path(post.id)).await;

    assert_eq!(result.unwrap(), StatusCode::NO_CONTENT);
}

#[test]
async fn test_delete_post_by_non_author_is_forbidden() {
    let post = public_post(Uuid::from_u128(42));
    let state = create_test_state(MockRepoControl {
        post_to_return: Some(post.clone()),
        ..MockRepoControl::default()
    });

    let result = handlers::delete_post(member_user(), State(state), Path(post.id)).await;

    let (status, kind) = error_response(result.unwrap_err()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(kind, "permission_denied");
}

#[test]
async fn test_list_users_forbidden_for_members() {
    let state = create_test_state(MockRepoControl::default());

    let result = handlers::list_users(
        member_user(),
        State(state),
        Query(handlers::PageQuery { page: None }),
    )
    .await;

    let (status, kind) = error_response(result.unwrap_err()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(kind, "permission_denied");
}

#[test]
async fn test_list_users_success_for_admin() {
    let state = create_test_state(MockRepoControl {
        users_to_return: vec![User::default(), User::default()],
        ..MockRepoControl::default()
    });

    let result = handlers::list_users(
        admin_user(),
        State(state),
        Query(handlers::PageQuery { page: None }),
    )
    .await;

    assert!(result.is_ok());
    let Json(page): Json<Page<ProfileView>> = result.unwrap();
    assert_eq!(page.count, 2);
    assert_eq!(page.results.len(), 2);
}

#[test]
async fn test_create_category_forbidden_for_members() {
    let state = create_test_state(MockRepoControl::default());

    let payload = CategoryRequest {
        name: "general".to_string(),
        description: None,
    };
    let result = handlers::create_category(member_user(), State(state), Json(payload)).await;

    let (status, kind) = error_response(result.unwrap_err()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(kind, "permission_denied");
}

#[test]
async fn test_search_with_empty_query_is_an_empty_page() {
    let state = create_test_state(MockRepoControl {
        // Even with rows configured, an empty query must not reach the repo.
        summaries_to_return: vec![PostSummary::default()],
        ..MockRepoControl::default()
    });

    let result = handlers::search(
        State(state),
        Query(handlers::SearchQuery {
            q: None,
            page: None,
        }),
    )
    .await;

    assert!(result.is_ok());
    let Json(page) = result.unwrap();
    assert_eq!(page.count, 0);
    assert!(page.results.is_empty());
}

#[test]
async fn test_add_comment_forces_author_and_post() {
    let post = public_post(Uuid::from_u128(42));
    let state = create_test_state(MockRepoControl {
        post_to_return: Some(post.clone()),
        ..MockRepoControl::default()
    });

    let result = handlers::add_comment(
        member_user(),
        State(state),
        Path(post.id),
        Json(CreateCommentRequest {
            content: "hello".to_string(),
        }),
    )
    .await;

    assert!(result.is_ok());
    let (status, Json(comment)) = result.unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment.author_id, TEST_ID);
    assert_eq!(comment.post_id, post.id);
}
