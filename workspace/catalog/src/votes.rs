use common::ToggleResult;
use model::entities::{product, product_vote};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, Set, TransactionTrait,
};
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::products::find_product;

/// Flips the caller's vote on a product.
///
/// The vote row and the popularity counter change in one transaction, so
/// popularity always equals the number of vote rows for the product.
#[instrument(skip(db))]
pub async fn toggle_vote<C: TransactionTrait>(
    db: &C,
    product_id: i32,
    user_id: i32,
) -> Result<ToggleResult> {
    let txn = db.begin().await?;
    find_product(&txn, product_id).await?;

    let existing = product_vote::Entity::find_by_id((product_id, user_id))
        .one(&txn)
        .await?;

    let (delta, voted) = match existing {
        Some(vote) => {
            debug!("Removing vote of user {} from product {}", user_id, product_id);
            vote.delete(&txn).await?;
            (-1, false)
        }
        None => {
            debug!("Adding vote of user {} to product {}", user_id, product_id);
            product_vote::ActiveModel {
                product_id: Set(product_id),
                user_id: Set(user_id),
            }
            .insert(&txn)
            .await?;
            (1, true)
        }
    };

    product::Entity::update_many()
        .col_expr(
            product::Column::Popularity,
            Expr::col(product::Column::Popularity).add(delta),
        )
        .filter(product::Column::Id.eq(product_id))
        .exec(&txn)
        .await?;

    let popularity = find_product(&txn, product_id).await?.popularity;
    txn.commit().await?;

    info!(
        "Product {} popularity is now {} (user {} voted: {})",
        product_id, popularity, user_id, voted
    );
    Ok(ToggleResult { popularity, voted })
}

pub async fn has_voted<C: ConnectionTrait>(db: &C, product_id: i32, user_id: i32) -> Result<bool> {
    Ok(product_vote::Entity::find_by_id((product_id, user_id))
        .one(db)
        .await?
        .is_some())
}

pub async fn voter_count<C: ConnectionTrait>(db: &C, product_id: i32) -> Result<u64> {
    Ok(product_vote::Entity::find()
        .filter(product_vote::Column::ProductId.eq(product_id))
        .count(db)
        .await?)
}
