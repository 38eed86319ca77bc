use post_board::{
    models::{CreatePostRequest, NewUser, Role, UpdatePostRequest, UpdateUserRequest},
    repository::{MemoryRepository, PostgresRepository, RepoError, Repository},
};
use sqlx::PgPool;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::test;

// --- Test Context and Setup ---

/// Connects to `DATABASE_URL` and applies migrations. Returns `None` when no database is
/// configured so the Postgres half of the suite is skipped rather than failed.
async fn postgres_repository() -> Option<PostgresRepository> {
    dotenv::dotenv().ok();
    let Ok(db_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping Postgres repository tests");
        return None;
    };

    let pool = PgPool::connect(&db_url)
        .await
        .expect("Failed to connect to database for integration tests.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations.");

    Some(PostgresRepository::new(pool))
}

// --- Test Data Helpers ---

/// Usernames unique per run so a shared database does not collide.
fn unique(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}-{}", prefix, nanos)
}

fn new_user(username: &str, role: Role) -> NewUser {
    NewUser {
        username: username.to_string(),
        name: "Test".to_string(),
        email: format!("{}@test.com", username),
        password_hash: "$2b$04$notarealhashnotarealhashnotarealhashnotarealhash0".to_string(),
        role,
    }
}

fn new_post(title: &str) -> CreatePostRequest {
    CreatePostRequest {
        title: title.to_string(),
        description: "Description".to_string(),
        publish_date: "2024-01-01".to_string(),
        link: "https://example.com".to_string(),
    }
}

// --- Shared Scenarios ---

async fn check_user_crud(repo: &dyn Repository) {
    let username = unique("crud");
    let created = repo.create_user(new_user(&username, Role::User)).await.unwrap();
    assert_eq!(created.username, username);
    assert_eq!(created.role, Role::User);

    let by_name = repo.find_user_by_username(&username).await.unwrap().unwrap();
    assert_eq!(by_name.id, created.id);
    assert_eq!(by_name.password_hash, created.password_hash);

    let updated = repo
        .update_user(
            created.id,
            UpdateUserRequest {
                username: None,
                name: Some("Renamed".to_string()),
                role: Some(Role::Admin),
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.username, username);
    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.role, Role::Admin);

    assert!(repo.update_password(created.id, "new-hash").await.unwrap());
    let reloaded = repo.get_user(created.id).await.unwrap().unwrap();
    assert_eq!(reloaded.password_hash, "new-hash");

    let before = repo.count_users().await.unwrap();
    assert!(repo.delete_user(created.id).await.unwrap());
    assert!(!repo.delete_user(created.id).await.unwrap());
    assert_eq!(repo.count_users().await.unwrap(), before - 1);
    assert!(repo.get_user(created.id).await.unwrap().is_none());
}

async fn check_unique_usernames(repo: &dyn Repository) {
    let username = unique("dup");
    let first = repo.create_user(new_user(&username, Role::User)).await.unwrap();

    let second = repo.create_user(new_user(&username, Role::Admin)).await;
    assert!(matches!(second, Err(RepoError::Conflict(_))));

    let other = repo
        .create_user(new_user(&unique("other"), Role::User))
        .await
        .unwrap();
    let rename = repo
        .update_user(
            other.id,
            UpdateUserRequest {
                username: Some(username.clone()),
                ..UpdateUserRequest::default()
            },
        )
        .await;
    assert!(matches!(rename, Err(RepoError::Conflict(_))));

    let stored = repo.get_user(first.id).await.unwrap().unwrap();
    assert_eq!(stored.role, Role::User);
}

async fn check_missing_rows(repo: &dyn Repository) {
    let missing = i64::MAX;
    assert!(repo.get_user(missing).await.unwrap().is_none());
    assert!(
        repo.update_user(missing, UpdateUserRequest::default())
            .await
            .unwrap()
            .is_none()
    );
    // A missing row wins over a username collision.
    let taken = repo
        .create_user(new_user(&unique("taken"), Role::User))
        .await
        .unwrap();
    let renamed = repo
        .update_user(
            missing,
            UpdateUserRequest {
                username: Some(taken.username.clone()),
                ..UpdateUserRequest::default()
            },
        )
        .await;
    assert!(matches!(renamed, Ok(None)));
    assert!(!repo.update_password(missing, "x").await.unwrap());
    assert!(!repo.delete_user(missing).await.unwrap());
    assert!(repo.get_post(missing).await.unwrap().is_none());
    assert!(
        repo.update_post(missing, UpdatePostRequest::default())
            .await
            .unwrap()
            .is_none()
    );
    assert!(!repo.delete_post(missing).await.unwrap());
}

async fn check_post_crud_and_owner_cleanup(repo: &dyn Repository) {
    let owner = repo
        .create_user(new_user(&unique("owner"), Role::User))
        .await
        .unwrap();

    let post = repo.create_post(new_post("Original"), owner.id).await.unwrap();
    assert_eq!(post.user_id, Some(owner.id));
    assert!(repo.list_posts().await.unwrap().iter().any(|p| p.id == post.id));

    let updated = repo
        .update_post(
            post.id,
            UpdatePostRequest {
                title: Some("Changed".to_string()),
                ..UpdatePostRequest::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.title, "Changed");
    assert_eq!(updated.description, "Description");
    assert_eq!(updated.publish_date, "2024-01-01");

    assert!(repo.delete_user(owner.id).await.unwrap());
    let orphan = repo.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(orphan.user_id, None);

    assert!(repo.delete_post(post.id).await.unwrap());
    assert!(repo.get_post(post.id).await.unwrap().is_none());
}

// --- Memory ---

#[test]
async fn test_memory_user_crud() {
    check_user_crud(&MemoryRepository::new()).await;
}

#[test]
async fn test_memory_unique_usernames() {
    check_unique_usernames(&MemoryRepository::new()).await;
}

#[test]
async fn test_memory_missing_rows() {
    check_missing_rows(&MemoryRepository::new()).await;
}

#[test]
async fn test_memory_post_crud_and_owner_cleanup() {
    check_post_crud_and_owner_cleanup(&MemoryRepository::new()).await;
}

#[test]
async fn test_memory_ids_are_sequential() {
    let repo = MemoryRepository::new();
    let a = repo.create_user(new_user("a", Role::User)).await.unwrap();
    let b = repo.create_user(new_user("b", Role::User)).await.unwrap();
    assert_eq!((a.id, b.id), (1, 2));

    let users = repo.list_users().await.unwrap();
    assert_eq!(
        users.iter().map(|u| u.username.as_str()).collect::<Vec<_>>(),
        vec!["a", "b"]
    );
}

// --- Postgres ---

#[test]
async fn test_postgres_user_crud() {
    if let Some(repo) = postgres_repository().await {
        check_user_crud(&repo).await;
    }
}

#[test]
async fn test_postgres_unique_usernames() {
    if let Some(repo) = postgres_repository().await {
        check_unique_usernames(&repo).await;
    }
}

#[test]
async fn test_postgres_missing_rows() {
    if let Some(repo) = postgres_repository().await {
        check_missing_rows(&repo).await;
    }
}

#[test]
async fn test_postgres_post_crud_and_owner_cleanup() {
    if let Some(repo) = postgres_repository().await {
        check_post_crud_and_owner_cleanup(&repo).await;
    }
}
