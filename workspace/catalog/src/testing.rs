//! Shared fixtures for the catalog tests.

use chrono::{Duration, Utc};
use migration::{Migrator, MigratorTrait};
use model::entities::{product, user};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};

/// Create an in-memory SQLite database with all migrations applied.
pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// Inserts a user without hashing a password; such accounts cannot log in.
pub async fn seed_user(db: &DatabaseConnection, username: &str) -> user::Model {
    user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(format!("{username}@example.com")),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        password_hash: Set("!".to_string()),
        date_joined: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to seed user")
}

/// Inserts a product created `age_minutes` ago, so tests control recency ordering.
pub async fn seed_product(
    db: &DatabaseConnection,
    owner: &user::Model,
    name: &str,
    category: &str,
    price: Decimal,
    age_minutes: i64,
) -> product::Model {
    product::ActiveModel {
        name: Set(name.to_string()),
        title: Set(format!("The {name}")),
        category: Set(category.to_string()),
        price: Set(price),
        popularity: Set(0),
        views: Set(0),
        image: Set(None),
        created_at: Set(Utc::now() - Duration::minutes(age_minutes)),
        owner_id: Set(owner.id),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to seed product")
}
