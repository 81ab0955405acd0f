use sea_orm::entity::prelude::*;

/// Represents a registered user of the marketplace.
#[derive(Clone, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    /// Stored lowercased. Empty when the account was created without one.
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Argon2 PHC string, never serialized.
    pub password_hash: String,
    pub date_joined: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    // Listed products are reached through `product::Relation::Owner`; `Related<product::Entity>`
    // below is reserved for the voter set.
    #[sea_orm(has_many = "super::product_vote::Entity")]
    ProductVote,
    #[sea_orm(has_one = "super::profile::Entity")]
    Profile,
    #[sea_orm(has_one = "super::auth_token::Entity")]
    AuthToken,
}

/// Products this user voted for ("favorites"), through the vote join table.
impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        super::product_vote::Relation::Product.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::product_vote::Relation::User.def().rev())
    }
}

impl Related<super::profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profile.def()
    }
}

impl Related<super::auth_token::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AuthToken.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// Spans and log lines format models with `{:?}`; the hash must never reach them.
impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("password_hash", &"[REDACTED]")
            .field("date_joined", &self.date_joined)
            .finish()
    }
}
