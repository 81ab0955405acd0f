use anyhow::{Result, bail};
use catalog::users::{self, NewUser};
use sea_orm::Database;
use tracing::{error, info, trace};
use validator::Validate;

use crate::handlers::users::SignupRequest;

/// Creates an account with the same validation as `POST /signup`.
pub async fn create_user(
    database_url: &str,
    username: &str,
    email: &str,
    password: &str,
) -> Result<()> {
    trace!("Entering create_user command");

    let request = SignupRequest {
        username: username.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        ..Default::default()
    };
    if let Err(errors) = request.validate() {
        error!("Refusing to create user: {}", errors);
        bail!("invalid user: {errors}");
    }

    let db = Database::connect(database_url).await?;
    let created = users::create_user(
        &db,
        NewUser {
            username: request.username,
            email: request.email,
            password: request.password,
            first_name: String::new(),
            last_name: String::new(),
        },
    )
    .await?;

    info!("Created user {} with ID {}", created.username, created.id);
    Ok(())
}
