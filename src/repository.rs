use crate::models::{
    CreatePostRequest, NewUser, Post, UpdatePostRequest, UpdateUserRequest, User,
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error;
use tokio::sync::RwLock;

/// RepoError
///
/// Persistence failures. `Conflict` carries the name of the field whose uniqueness was
/// violated so the API layer can phrase a 409.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{0} must be unique")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository Trait
///
/// Abstract contract for all persistence operations. Handlers only see this trait, which
/// lets the router run against Postgres in production and the in-memory store in tests
/// and database-less local runs.
///
/// Mutations that target a single row report absence as `Ok(false)` / `Ok(None)` rather
/// than an error, so handlers can answer 404 without inspecting driver errors.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    // Fails with `RepoError::Conflict` if the username is taken.
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    async fn update_password(&self, id: i64, password_hash: &str) -> RepoResult<bool>;
    // Partial update; `None` fields keep their current value.
    async fn update_user(&self, id: i64, changes: UpdateUserRequest) -> RepoResult<Option<User>>;
    async fn delete_user(&self, id: i64) -> RepoResult<bool>;
    async fn count_users(&self) -> RepoResult<i64>;

    // --- Posts ---
    async fn list_posts(&self) -> RepoResult<Vec<Post>>;
    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>>;
    async fn create_post(&self, req: CreatePostRequest, user_id: i64) -> RepoResult<Post>;
    async fn update_post(&self, id: i64, req: UpdatePostRequest) -> RepoResult<Option<Post>>;
    async fn delete_post(&self, id: i64) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Postgres ---

/// PostgresRepository
///
/// The `Repository` backed by PostgreSQL. Queries are checked at runtime so the crate
/// builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, username, name, email, password_hash, role";
const POST_COLUMNS: &str = "id, user_id, title, description, publish_date, link";

/// Maps a unique-index violation to `RepoError::Conflict(field)`.
fn unique_violation(err: sqlx::Error, field: &str) -> RepoError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            RepoError::Conflict(field.to_string())
        }
        _ => RepoError::Database(err),
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"INSERT INTO users (username, name, email, password_hash, role)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(&user.username)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Username"))
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> RepoResult<bool> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// update_user
    ///
    /// COALESCE keeps the stored value for every field the caller left out.
    async fn update_user(&self, id: i64, changes: UpdateUserRequest) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            r#"UPDATE users
               SET username = COALESCE($2, username),
                   name     = COALESCE($3, name),
                   role     = COALESCE($4, role)
               WHERE id = $1
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(id)
        .bind(changes.username)
        .bind(changes.name)
        .bind(changes.role.map(|r| r.as_str()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Username"))
    }

    async fn delete_user(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_users(&self) -> RepoResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_posts(&self) -> RepoResult<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn create_post(&self, req: CreatePostRequest, user_id: i64) -> RepoResult<Post> {
        let post = sqlx::query_as::<_, Post>(&format!(
            r#"INSERT INTO posts (user_id, title, description, publish_date, link)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {POST_COLUMNS}"#
        ))
        .bind(user_id)
        .bind(req.title)
        .bind(req.description)
        .bind(req.publish_date)
        .bind(req.link)
        .fetch_one(&self.pool)
        .await?;
        Ok(post)
    }

    async fn update_post(&self, id: i64, req: UpdatePostRequest) -> RepoResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!(
            r#"UPDATE posts
               SET title        = COALESCE($2, title),
                   description  = COALESCE($3, description),
                   publish_date = COALESCE($4, publish_date),
                   link         = COALESCE($5, link)
               WHERE id = $1
               RETURNING {POST_COLUMNS}"#
        ))
        .bind(id)
        .bind(req.title)
        .bind(req.description)
        .bind(req.publish_date)
        .bind(req.link)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn delete_post(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// --- In-memory ---

#[derive(Default)]
struct MemoryTables {
    users: BTreeMap<i64, User>,
    posts: BTreeMap<i64, Post>,
    next_user_id: i64,
    next_post_id: i64,
}

/// MemoryRepository
///
/// A `Repository` held entirely in process memory. Used by the test suites and by local
/// runs without `DATABASE_URL`. It mirrors the Postgres constraints that handlers rely on:
/// unique usernames, partial updates, and nulling a post's owner when the user is deleted.
#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<MemoryTables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryTables {
    fn username_taken(&self, username: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| u.username == username && Some(u.id) != except)
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list_users(&self) -> RepoResult<Vec<User>> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut tables = self.tables.write().await;
        if tables.username_taken(&user.username, None) {
            return Err(RepoError::Conflict("Username".to_string()));
        }
        tables.next_user_id += 1;
        let created = User {
            id: tables.next_user_id,
            username: user.username,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_user(&self, id: i64, changes: UpdateUserRequest) -> RepoResult<Option<User>> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&id) {
            return Ok(None);
        }
        if let Some(username) = &changes.username {
            if tables.username_taken(username, Some(id)) {
                return Err(RepoError::Conflict("Username".to_string()));
            }
        }
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i64) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }
        // ON DELETE SET NULL
        for post in tables.posts.values_mut() {
            if post.user_id == Some(id) {
                post.user_id = None;
            }
        }
        Ok(true)
    }

    async fn count_users(&self) -> RepoResult<i64> {
        Ok(self.tables.read().await.users.len() as i64)
    }

    async fn list_posts(&self) -> RepoResult<Vec<Post>> {
        Ok(self.tables.read().await.posts.values().cloned().collect())
    }

    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn create_post(&self, req: CreatePostRequest, user_id: i64) -> RepoResult<Post> {
        let mut tables = self.tables.write().await;
        tables.next_post_id += 1;
        let post = Post {
            id: tables.next_post_id,
            user_id: Some(user_id),
            title: req.title,
            description: req.description,
            publish_date: req.publish_date,
            link: req.link,
        };
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update_post(&self, id: i64, req: UpdatePostRequest) -> RepoResult<Option<Post>> {
        let mut tables = self.tables.write().await;
        let Some(post) = tables.posts.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            post.title = title;
        }
        if let Some(description) = req.description {
            post.description = description;
        }
        if let Some(publish_date) = req.publish_date {
            post.publish_date = publish_date;
        }
        if let Some(link) = req.link {
            post.link = link;
        }
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, id: i64) -> RepoResult<bool> {
        Ok(self.tables.write().await.posts.remove(&id).is_some())
    }
}
