use thiserror::Error;

use crate::{
    config::AppConfig,
    models::{NewUser, Role},
    password::{PasswordError, hash_password},
    repository::{RepoError, Repository},
};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// seed_admin
///
/// Creates the initial admin account when the user table is empty and an admin password
/// is configured. Returns whether a user was inserted.
pub async fn seed_admin(repo: &dyn Repository, config: &AppConfig) -> Result<bool, SeedError> {
    let Some(seed) = &config.admin_seed else {
        tracing::info!("ADMIN_PASSWORD not set, skipping admin seed.");
        return Ok(false);
    };

    if repo.count_users().await? > 0 {
        tracing::info!("User table already seeded.");
        return Ok(false);
    }

    let password_hash = hash_password(&seed.password, config.bcrypt_cost).await?;
    let admin = repo
        .create_user(NewUser {
            username: seed.username.clone(),
            name: seed.name.clone(),
            email: String::new(),
            password_hash,
            role: Role::Admin,
        })
        .await?;

    tracing::info!(user_id = admin.id, username = %admin.username, "Admin user seeded successfully.");
    Ok(true)
}
