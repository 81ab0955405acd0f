pub mod health;
pub mod products;
pub mod profile;
pub mod uploads;
pub mod users;
