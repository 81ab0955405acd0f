pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_table;
mod m20250415_000001_create_profile;
mod m20250501_000001_unique_user_email;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_table::Migration),
            Box::new(m20250415_000001_create_profile::Migration),
            Box::new(m20250501_000001_unique_user_email::Migration),
        ]
    }
}
