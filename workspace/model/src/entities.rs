//! This file serves as the root for all SeaORM entity modules.
//! We define the data models of the marketplace here: accounts and their
//! bearer tokens, user profiles, and the product catalog with its voter set.

pub mod auth_token;
pub mod product;
pub mod product_image;
pub mod product_vote;
pub mod profile;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::auth_token::Entity as AuthToken;
    pub use super::product::Entity as Product;
    pub use super::product_image::Entity as ProductImage;
    pub use super::product_vote::Entity as ProductVote;
    pub use super::profile::Entity as Profile;
    pub use super::user::Entity as User;
}
