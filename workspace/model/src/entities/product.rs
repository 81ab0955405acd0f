use super::user;
use sea_orm::entity::prelude::*;

/// A catalog item listed by a user.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub title: String,
    pub category: String,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub price: Decimal,
    /// Number of users in the voter set. Only changed together with `product_votes`.
    #[sea_orm(default_value = 0)]
    pub popularity: i32,
    #[sea_orm(default_value = 0)]
    pub views: i32,
    /// Object key of the cover image.
    pub image: Option<String>,
    pub created_at: DateTimeUtc,
    pub owner_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A product belongs to the user who listed it.
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Owner,
    #[sea_orm(has_many = "super::product_vote::Entity")]
    ProductVote,
    #[sea_orm(has_many = "super::product_image::Entity")]
    ProductImage,
}

/// Voters of a product, through the vote join table.
impl Related<user::Entity> for Entity {
    fn to() -> RelationDef {
        super::product_vote::Relation::User.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::product_vote::Relation::Product.def().rev())
    }
}

impl Related<super::product_image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductImage.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
