use crate::models::{
    Attachment, Category, CategoryRequest, Comment, CreatePostRequest, NewUser, Post,
    PostDetail, PostOrdering, PostSummary, UpdateCategoryRequest, UpdatePostRequest,
    UpdateProfileRequest, User,
};
use async_trait::async_trait;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

/// PostListQuery
///
/// The resolved inputs of a post listing: visibility context, requested
/// filters, optional search string and the pagination window. Visibility is
/// applied inside the SQL WHERE clause, before LIMIT/OFFSET, so private rows
/// never occupy page slots they cannot fill.
#[derive(Debug, Clone, Default)]
pub struct PostListQuery {
    /// The authenticated viewer, if any. Anonymous viewers are restricted to
    /// public posts; authenticated viewers additionally see their own private
    /// posts.
    pub viewer: Option<Uuid>,
    pub category: Option<Uuid>,
    pub author: Option<Uuid>,
    pub is_public: Option<bool>,
    /// Case-insensitive substring matched against title OR content.
    pub search: Option<String>,
    pub ordering: PostOrdering,
    pub limit: i64,
    pub offset: i64,
}

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, allowing the
/// service layer to interact with the data layer without knowing the specific
/// implementation (Postgres, Mock, etc.).
///
/// Every method returns `Result` so unexpected storage failures propagate to
/// the service boundary instead of being swallowed. Lifecycle rules (cascade
/// on post delete, detach on category delete) are explicit transaction steps
/// here, not declarative schema behavior.
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn create_user(&self, user: NewUser) -> Result<User, sqlx::Error>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, sqlx::Error>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error>;
    // Partial update via COALESCE; email and id are not reachable through this.
    async fn update_profile(
        &self,
        id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<Option<User>, sqlx::Error>;
    async fn set_password_hash(&self, id: Uuid, hash: &str) -> Result<bool, sqlx::Error>;
    // Returns one page of users plus the total count.
    async fn list_users(&self, limit: i64, offset: i64)
    -> Result<(Vec<User>, i64), sqlx::Error>;

    // --- Categories ---
    async fn list_categories(&self) -> Result<Vec<Category>, sqlx::Error>;
    async fn get_category(&self, id: Uuid) -> Result<Option<Category>, sqlx::Error>;
    async fn create_category(&self, req: CategoryRequest) -> Result<Category, sqlx::Error>;
    async fn update_category(
        &self,
        id: Uuid,
        req: UpdateCategoryRequest,
    ) -> Result<Option<Category>, sqlx::Error>;
    /// Detaches the category's posts (category_id set to NULL), then deletes the
    /// category, all in one transaction. Returns false when the id was unknown.
    async fn delete_category(&self, id: Uuid) -> Result<bool, sqlx::Error>;

    // --- Posts ---
    async fn list_posts(
        &self,
        q: PostListQuery,
    ) -> Result<(Vec<PostSummary>, i64), sqlx::Error>;
    // Raw row fetch, no visibility applied. Policy decisions happen above.
    async fn get_post(&self, id: Uuid) -> Result<Option<Post>, sqlx::Error>;
    async fn get_post_detail(&self, id: Uuid) -> Result<Option<PostDetail>, sqlx::Error>;
    /// Atomic `views = views + 1`; returns the incremented value. Concurrent
    /// callers cannot lose increments because the addition happens in the store.
    async fn increment_views(&self, id: Uuid) -> Result<Option<i64>, sqlx::Error>;
    async fn create_post(
        &self,
        author_id: Uuid,
        req: CreatePostRequest,
    ) -> Result<Post, sqlx::Error>;
    async fn update_post(
        &self,
        id: Uuid,
        req: UpdatePostRequest,
    ) -> Result<Option<Post>, sqlx::Error>;
    /// Deletes the post and, in the same transaction, its likes, comments and
    /// attachments. Returns the attachment file keys so the caller can clean up
    /// the blob store after commit; None when the post did not exist.
    async fn delete_post(&self, id: Uuid) -> Result<Option<Vec<String>>, sqlx::Error>;

    // --- Likes ---
    /// Conditional insert (ON CONFLICT DO NOTHING). True iff a row was added,
    /// i.e. the actor was not yet in the like set.
    async fn insert_like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error>;
    /// Conditional delete. True iff a row was removed.
    async fn remove_like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error>;
    async fn count_likes(&self, post_id: Uuid) -> Result<i64, sqlx::Error>;

    // --- Search ---
    /// Title-only, case-insensitive substring search over public posts.
    async fn search_posts(
        &self,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PostSummary>, i64), sqlx::Error>;

    // --- Attachments & Comments ---
    async fn create_attachment(
        &self,
        post_id: Uuid,
        file_key: &str,
        original_name: &str,
        file_size: i64,
    ) -> Result<Attachment, sqlx::Error>;
    async fn list_attachments(&self, post_id: Uuid) -> Result<Vec<Attachment>, sqlx::Error>;
    async fn add_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        content: &str,
    ) -> Result<Comment, sqlx::Error>;
    // Ascending by creation time.
    async fn get_comments(&self, post_id: Uuid) -> Result<Vec<Comment>, sqlx::Error>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Queries use the runtime-checked sqlx API (`query_as::<_, T>` with binds)
/// so the crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const POST_SUMMARY_SELECT: &str = r#"
    SELECT p.id, p.title, p.author_id, u.username AS author_name,
           p.category_id, c.name AS category_name, p.views,
           (SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id) AS comment_count,
           p.is_public, p.created_at
    FROM posts p
    JOIN users u ON p.author_id = u.id
    LEFT JOIN categories c ON p.category_id = c.id
    WHERE 1 = 1
"#;

const USER_COLUMNS: &str = "id, email, username, phone, organization, profile_image, \
                            password_hash, is_staff, is_active, created_at, updated_at";

/// Appends the visibility clause and the requested filters to a post query.
/// Shared between the page query and its COUNT twin so the two can never
/// disagree on which rows are in scope.
fn push_post_filters(builder: &mut QueryBuilder<'_, sqlx::Postgres>, q: &PostListQuery) {
    match q.viewer {
        // Anonymous callers only ever see public posts, regardless of the
        // requested filters.
        None => {
            builder.push(" AND p.is_public = TRUE");
        }
        Some(viewer) => {
            builder.push(" AND (p.is_public = TRUE OR p.author_id = ");
            builder.push_bind(viewer);
            builder.push(")");
        }
    }

    if let Some(category) = q.category {
        builder.push(" AND p.category_id = ");
        builder.push_bind(category);
    }
    if let Some(author) = q.author {
        builder.push(" AND p.author_id = ");
        builder.push_bind(author);
    }
    if let Some(is_public) = q.is_public {
        builder.push(" AND p.is_public = ");
        builder.push_bind(is_public);
    }
    if let Some(search) = &q.search {
        let pattern = format!("%{}%", search);
        builder.push(" AND (p.title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR p.content ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn create_user(&self, user: NewUser) -> Result<User, sqlx::Error> {
        let new_id = Uuid::new_v4();
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users
                (id, email, username, phone, organization, profile_image,
                 password_hash, is_staff, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NULL, $6, FALSE, TRUE, NOW(), NOW())
            RETURNING id, email, username, phone, organization, profile_image,
                      password_hash, is_staff, is_active, created_at, updated_at
            "#,
        )
        .bind(new_id)
        .bind(user.email)
        .bind(user.username)
        .bind(user.phone)
        .bind(user.organization)
        .bind(user.password_hash)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    /// Uses the PostgreSQL `COALESCE` function to handle `Option<T>` fields,
    /// only updating a column when the corresponding field is `Some`.
    async fn update_profile(
        &self,
        id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                phone = COALESCE($3, phone),
                organization = COALESCE($4, organization),
                profile_image = COALESCE($5, profile_image),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, username, phone, organization, profile_image,
                      password_hash, is_staff, is_active, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(req.username)
        .bind(req.phone)
        .bind(req.organization)
        .bind(req.profile_image)
        .fetch_optional(&self.pool)
        .await
    }

    async fn set_password_hash(&self, id: Uuid, hash: &str) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(hash)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_users(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<User>, i64), sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((users, count))
    }

    // --- CATEGORIES ---

    async fn list_categories(&self) -> Result<Vec<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>(
            "SELECT id, name, description, created_at FROM categories ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>(
            "SELECT id, name, description, created_at FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_category(&self, req: CategoryRequest) -> Result<Category, sqlx::Error> {
        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (id, name, description, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.name)
        .bind(req.description)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_category(
        &self,
        id: Uuid,
        req: UpdateCategoryRequest,
    ) -> Result<Option<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
            SET name = COALESCE($2, name),
                description = COALESCE($3, description)
            WHERE id = $1
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(id)
        .bind(req.name)
        .bind(req.description)
        .fetch_optional(&self.pool)
        .await
    }

    /// Set-null on delete, spelled out: the posts referencing this category are
    /// detached first, inside the same transaction that removes the category.
    async fn delete_category(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE posts SET category_id = NULL WHERE category_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    // --- POSTS ---

    /// Implements flexible filtering and search using QueryBuilder for safe
    /// parameterization. Visibility is part of the WHERE clause, so it applies
    /// before pagination.
    async fn list_posts(
        &self,
        q: PostListQuery,
    ) -> Result<(Vec<PostSummary>, i64), sqlx::Error> {
        let mut count_builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM posts p WHERE 1 = 1");
        push_post_filters(&mut count_builder, &q);
        let count: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(POST_SUMMARY_SELECT);
        push_post_filters(&mut builder, &q);
        builder.push(" ORDER BY ");
        builder.push(q.ordering.sql());
        builder.push(" LIMIT ");
        builder.push_bind(q.limit);
        builder.push(" OFFSET ");
        builder.push_bind(q.offset);

        let posts = builder
            .build_query_as::<PostSummary>()
            .fetch_all(&self.pool)
            .await?;

        Ok((posts, count))
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(
            r#"
            SELECT id, title, content, author_id, category_id, views, is_public,
                   created_at, updated_at
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_post_detail(&self, id: Uuid) -> Result<Option<PostDetail>, sqlx::Error> {
        let head = sqlx::query_as::<_, crate::models::PostDetailHead>(
            r#"
            SELECT p.id, p.title, p.content, p.author_id, u.username AS author_name,
                   p.category_id, c.name AS category_name, p.views, p.is_public,
                   (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id) AS likes_count,
                   p.created_at, p.updated_at
            FROM posts p
            JOIN users u ON p.author_id = u.id
            LEFT JOIN categories c ON p.category_id = c.id
            WHERE p.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(head) = head else {
            return Ok(None);
        };

        let attachments = self.list_attachments(id).await?;
        let comments = self.get_comments(id).await?;

        Ok(Some(head.into_detail(attachments, comments)))
    }

    async fn increment_views(&self, id: Uuid) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE posts SET views = views + 1 WHERE id = $1 RETURNING views",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_post(
        &self,
        author_id: Uuid,
        req: CreatePostRequest,
    ) -> Result<Post, sqlx::Error> {
        sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts
                (id, title, content, author_id, category_id, views, is_public,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 0, $6, NOW(), NOW())
            RETURNING id, title, content, author_id, category_id, views, is_public,
                      created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.title)
        .bind(req.content)
        .bind(author_id)
        .bind(req.category)
        .bind(req.is_public.unwrap_or(true))
        .fetch_one(&self.pool)
        .await
    }

    /// Partial update via COALESCE. Author, views and timestamps are not
    /// reachable through this statement by construction.
    async fn update_post(
        &self,
        id: Uuid,
        req: UpdatePostRequest,
    ) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET title = COALESCE($2, title),
                content = COALESCE($3, content),
                category_id = COALESCE($4, category_id),
                is_public = COALESCE($5, is_public),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, title, content, author_id, category_id, views, is_public,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(req.title)
        .bind(req.content)
        .bind(req.category)
        .bind(req.is_public)
        .fetch_optional(&self.pool)
        .await
    }

    /// Cascade delete, spelled out as explicit transaction steps so no orphan
    /// likes, comments or attachments can remain queryable.
    async fn delete_post(&self, id: Uuid) -> Result<Option<Vec<String>>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM posts WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Ok(None);
        }

        sqlx::query("DELETE FROM post_likes WHERE post_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM comments WHERE post_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let file_keys: Vec<String> = sqlx::query_scalar(
            "DELETE FROM attachments WHERE post_id = $1 RETURNING file_key",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(file_keys))
    }

    // --- LIKES ---

    /// Inserts a like. Uses `ON CONFLICT DO NOTHING` against the composite
    /// primary key so the set semantics hold under concurrent calls: only one
    /// of two racing inserts reports an added row.
    async fn insert_like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO post_likes (user_id, post_id, created_at) VALUES ($1, $2, NOW()) \
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(post_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM post_likes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_likes(&self, post_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM post_likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await
    }

    // --- SEARCH ---

    /// Title-only substring match, restricted to public posts. The service layer
    /// short-circuits empty queries before this is reached.
    async fn search_posts(
        &self,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PostSummary>, i64), sqlx::Error> {
        let pattern = format!("%{}%", query);

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM posts p WHERE p.is_public = TRUE AND p.title ILIKE $1",
        )
        .bind(pattern.clone())
        .fetch_one(&self.pool)
        .await?;

        let posts = sqlx::query_as::<_, PostSummary>(&format!(
            "{POST_SUMMARY_SELECT} AND p.is_public = TRUE AND p.title ILIKE $1 \
             ORDER BY p.created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((posts, count))
    }

    // --- ATTACHMENTS & COMMENTS ---

    async fn create_attachment(
        &self,
        post_id: Uuid,
        file_key: &str,
        original_name: &str,
        file_size: i64,
    ) -> Result<Attachment, sqlx::Error> {
        sqlx::query_as::<_, Attachment>(
            r#"
            INSERT INTO attachments (id, post_id, file_key, original_name, file_size, uploaded_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING id, post_id, file_key, original_name, file_size, uploaded_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(post_id)
        .bind(file_key)
        .bind(original_name)
        .bind(file_size)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_attachments(&self, post_id: Uuid) -> Result<Vec<Attachment>, sqlx::Error> {
        sqlx::query_as::<_, Attachment>(
            r#"
            SELECT id, post_id, file_key, original_name, file_size, uploaded_at
            FROM attachments
            WHERE post_id = $1
            ORDER BY uploaded_at ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Inserts a new comment and immediately joins with `users` to return the
    /// enriched row, including the author's display name. A CTE keeps the
    /// insert and the join in one round trip.
    async fn add_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        content: &str,
    ) -> Result<Comment, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (post_id, author_id, content, created_at, updated_at)
                VALUES ($1, $2, $3, NOW(), NOW())
                RETURNING id, post_id, author_id, content, created_at, updated_at
            )
            SELECT i.id, i.post_id, i.author_id, i.content, i.created_at, i.updated_at,
                   u.username AS author_name
            FROM inserted i
            JOIN users u ON i.author_id = u.id
            "#,
        )
        .bind(post_id)
        .bind(author_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_comments(&self, post_id: Uuid) -> Result<Vec<Comment>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.post_id, c.author_id, c.content, c.created_at, c.updated_at,
                   u.username AS author_name
            FROM comments c
            JOIN users u ON c.author_id = u.id
            WHERE c.post_id = $1
            ORDER BY c.created_at ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
    }
}
