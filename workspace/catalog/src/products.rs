use chrono::Utc;
use common::{ProductFilter, SortBy};
use model::entities::{product, product_image, product_vote, user};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{CatalogError, Result};

/// Fields needed to list a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub title: String,
    pub category: String,
    pub price: Decimal,
}

fn sorted(query: Select<product::Entity>, sort: SortBy) -> Select<product::Entity> {
    match sort {
        SortBy::Newest => query
            .order_by_desc(product::Column::CreatedAt)
            .order_by_desc(product::Column::Id),
        SortBy::Popular => query
            .order_by_desc(product::Column::Popularity)
            .order_by_desc(product::Column::CreatedAt)
            .order_by_desc(product::Column::Id),
    }
}

#[instrument(skip(db))]
pub async fn create_product<C: ConnectionTrait>(
    db: &C,
    owner_id: i32,
    new_product: NewProduct,
) -> Result<product::Model> {
    let created = product::ActiveModel {
        name: Set(new_product.name),
        title: Set(new_product.title),
        category: Set(new_product.category),
        price: Set(new_product.price),
        popularity: Set(0),
        views: Set(0),
        image: Set(None),
        created_at: Set(Utc::now()),
        owner_id: Set(owner_id),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Created product {} for user {}", created.id, owner_id);
    Ok(created)
}

/// One page of the catalog, newest first. Pages are 1-based.
pub async fn list_products<C: ConnectionTrait>(
    db: &C,
    page: u64,
    limit: u64,
) -> Result<Vec<product::Model>> {
    let products = sorted(product::Entity::find(), SortBy::Newest)
        .paginate(db, limit)
        .fetch_page(page.saturating_sub(1))
        .await?;
    Ok(products)
}

/// Applies the category, price range and search filters and the requested ordering.
#[instrument(skip(db))]
pub async fn filter_products<C: ConnectionTrait>(
    db: &C,
    filter: &ProductFilter,
) -> Result<Vec<product::Model>> {
    trace!("Building product filter query");
    let sort = filter.sort()?;
    let mut query = product::Entity::find();

    if let Some(category) = filter.category_filter() {
        debug!("Filtering by category: {}", category);
        query = query.filter(product::Column::Category.eq(category));
    }

    if let Some(bounds) = filter.price_bounds()? {
        debug!("Filtering by price range: {} - {}", bounds.min, bounds.max);
        query = query
            .filter(product::Column::Price.gte(bounds.min))
            .filter(product::Column::Price.lte(bounds.max));
    }

    if let Some(term) = filter.search_term() {
        debug!("Filtering by search term: {}", term);
        query = query.filter(
            Condition::any()
                .add(product::Column::Name.contains(term))
                .add(product::Column::Title.contains(term)),
        );
    }

    let products = sorted(query, sort).all(db).await?;
    info!("Filter matched {} products (sort: {})", products.len(), sort);
    Ok(products)
}

pub async fn find_product<C: ConnectionTrait>(db: &C, product_id: i32) -> Result<product::Model> {
    product::Entity::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or(CatalogError::ProductNotFound(product_id))
}

/// Increments the view counter by exactly one and returns the updated product.
///
/// The increment is a single `UPDATE ... SET views = views + 1`, so concurrent
/// views are never lost.
#[instrument(skip(db))]
pub async fn record_view<C: ConnectionTrait>(db: &C, product_id: i32) -> Result<product::Model> {
    let result = product::Entity::update_many()
        .col_expr(
            product::Column::Views,
            Expr::col(product::Column::Views).add(1),
        )
        .filter(product::Column::Id.eq(product_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        warn!("Cannot record view, product {} does not exist", product_id);
        return Err(CatalogError::ProductNotFound(product_id));
    }

    let product = find_product(db, product_id).await?;
    debug!("Product {} now has {} views", product.id, product.views);
    Ok(product)
}

pub async fn gallery<C: ConnectionTrait>(
    db: &C,
    product: &product::Model,
) -> Result<Vec<product_image::Model>> {
    Ok(product
        .find_related(product_image::Entity)
        .order_by_asc(product_image::Column::Id)
        .all(db)
        .await?)
}

/// Loads the product and checks that `user_id` listed it.
pub async fn find_owned_product<C: ConnectionTrait>(
    db: &C,
    product_id: i32,
    user_id: i32,
) -> Result<product::Model> {
    let product = find_product(db, product_id).await?;
    if product.owner_id != user_id {
        warn!(
            "User {} attempted to modify product {} owned by {}",
            user_id, product_id, product.owner_id
        );
        return Err(CatalogError::NotOwner {
            product_id,
            user_id,
        });
    }
    Ok(product)
}

/// Records an uploaded gallery image. Only the owner may add images.
#[instrument(skip(db))]
pub async fn add_gallery_image<C: ConnectionTrait>(
    db: &C,
    product_id: i32,
    user_id: i32,
    image_key: String,
) -> Result<product_image::Model> {
    let product = find_owned_product(db, product_id, user_id).await?;

    // The first uploaded image doubles as the cover.
    if product.image.is_none() {
        let mut active: product::ActiveModel = product.into();
        active.image = Set(Some(image_key.clone()));
        active.update(db).await?;
    }

    let image = product_image::ActiveModel {
        product_id: Set(product_id),
        image: Set(image_key),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Added image {} to product {}", image.id, product_id);
    Ok(image)
}

/// Deletes an owned product together with its votes and gallery.
///
/// Returns the deleted product and the storage keys no longer referenced.
#[instrument(skip(db))]
pub async fn delete_product<C: TransactionTrait>(
    db: &C,
    product_id: i32,
    user_id: i32,
) -> Result<(product::Model, Vec<String>)> {
    let txn = db.begin().await?;
    let product = find_owned_product(&txn, product_id, user_id).await?;

    let images = gallery(&txn, &product).await?;
    let mut orphaned_keys: Vec<String> = images.into_iter().map(|i| i.image).collect();
    if let Some(cover) = &product.image {
        if !orphaned_keys.contains(cover) {
            orphaned_keys.push(cover.clone());
        }
    }

    product_vote::Entity::delete_many()
        .filter(product_vote::Column::ProductId.eq(product_id))
        .exec(&txn)
        .await?;
    product_image::Entity::delete_many()
        .filter(product_image::Column::ProductId.eq(product_id))
        .exec(&txn)
        .await?;
    product::Entity::delete_by_id(product_id).exec(&txn).await?;

    txn.commit().await?;
    info!(
        "Deleted product {} ({} stored images released)",
        product_id,
        orphaned_keys.len()
    );
    Ok((product, orphaned_keys))
}

/// Highest price in the catalog, `None` when it is empty.
pub async fn max_price<C: ConnectionTrait>(db: &C) -> Result<Option<Decimal>> {
    let most_expensive = product::Entity::find()
        .order_by_desc(product::Column::Price)
        .one(db)
        .await?;
    Ok(most_expensive.map(|p| p.price))
}

/// Distinct categories in alphabetical order.
pub async fn categories<C: ConnectionTrait>(db: &C) -> Result<Vec<String>> {
    let categories = product::Entity::find()
        .select_only()
        .column(product::Column::Category)
        .distinct()
        .order_by_asc(product::Column::Category)
        .into_tuple::<String>()
        .all(db)
        .await?;
    Ok(categories)
}

/// Products listed by the user, newest first.
pub async fn owned_by<C: ConnectionTrait>(db: &C, owner_id: i32) -> Result<Vec<product::Model>> {
    Ok(sorted(
        product::Entity::find().filter(product::Column::OwnerId.eq(owner_id)),
        SortBy::Newest,
    )
    .all(db)
    .await?)
}

/// Products the user voted for, newest first.
pub async fn favorites_of<C: ConnectionTrait>(
    db: &C,
    voter: &user::Model,
) -> Result<Vec<product::Model>> {
    Ok(sorted(voter.find_related(product::Entity), SortBy::Newest)
        .all(db)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_product, seed_user, setup_db};

    fn price(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn names(products: &[product::Model]) -> Vec<&str> {
        products.iter().map(|p| p.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_price_range_is_inclusive() {
        let db = setup_db().await;
        let owner = seed_user(&db, "seller").await;
        seed_product(&db, &owner, "Pencil", "office", price("0.99"), 4).await;
        seed_product(&db, &owner, "Novel", "books", price("10.00"), 3).await;
        seed_product(&db, &owner, "Atlas", "books", price("19.99"), 2).await;
        seed_product(&db, &owner, "Desk", "office", price("250.00"), 1).await;

        let filter = ProductFilter {
            price_range: Some(vec![10.0, 19.99]),
            ..Default::default()
        };
        let found = filter_products(&db, &filter).await.unwrap();

        assert_eq!(names(&found), vec!["Atlas", "Novel"]);
        assert!(
            found
                .iter()
                .all(|p| p.price >= price("10") && p.price <= price("19.99"))
        );
    }

    #[tokio::test]
    async fn test_category_and_search() {
        let db = setup_db().await;
        let owner = seed_user(&db, "seller").await;
        seed_product(&db, &owner, "Road Atlas", "books", price("12"), 3).await;
        seed_product(&db, &owner, "Novel", "books", price("8"), 2).await;
        seed_product(&db, &owner, "Atlas Lamp", "home", price("40"), 1).await;

        let books = ProductFilter {
            category: Some("books".to_string()),
            ..Default::default()
        };
        assert_eq!(
            names(&filter_products(&db, &books).await.unwrap()),
            vec!["Novel", "Road Atlas"]
        );

        let everything = ProductFilter {
            category: Some("all".to_string()),
            ..Default::default()
        };
        assert_eq!(filter_products(&db, &everything).await.unwrap().len(), 3);

        let atlas_books = ProductFilter {
            category: Some("books".to_string()),
            search: Some("atlas".to_string()),
            ..Default::default()
        };
        assert_eq!(
            names(&filter_products(&db, &atlas_books).await.unwrap()),
            vec!["Road Atlas"]
        );

        // Titles are searched too ("The Novel")
        let by_title = ProductFilter {
            search: Some("The Nov".to_string()),
            ..Default::default()
        };
        assert_eq!(
            names(&filter_products(&db, &by_title).await.unwrap()),
            vec!["Novel"]
        );
    }

    #[tokio::test]
    async fn test_sort_by_popularity() {
        let db = setup_db().await;
        let owner = seed_user(&db, "seller").await;
        let old_hit = seed_product(&db, &owner, "Old hit", "music", price("5"), 30).await;
        seed_product(&db, &owner, "Fresh", "music", price("5"), 1).await;
        seed_product(&db, &owner, "Middle", "music", price("5"), 10).await;

        let mut active: product::ActiveModel = old_hit.into();
        active.popularity = Set(3);
        active.update(&db).await.unwrap();

        let newest = filter_products(&db, &ProductFilter::default()).await.unwrap();
        assert_eq!(names(&newest), vec!["Fresh", "Middle", "Old hit"]);

        let popular = ProductFilter {
            sort_by: Some("popular".to_string()),
            ..Default::default()
        };
        assert_eq!(
            names(&filter_products(&db, &popular).await.unwrap()),
            vec!["Old hit", "Fresh", "Middle"]
        );
    }

    #[tokio::test]
    async fn test_invalid_filter_rejected() {
        let db = setup_db().await;
        let filter = ProductFilter {
            sort_by: Some("cheapest".to_string()),
            ..Default::default()
        };
        let err = filter_products(&db, &filter).await.unwrap_err();
        assert!(matches!(err, CatalogError::InvalidFilter(_)));
    }

    #[tokio::test]
    async fn test_record_view_increments_by_one() {
        let db = setup_db().await;
        let owner = seed_user(&db, "seller").await;
        let lamp = seed_product(&db, &owner, "Lamp", "home", price("30"), 0).await;

        assert_eq!(record_view(&db, lamp.id).await.unwrap().views, 1);
        assert_eq!(record_view(&db, lamp.id).await.unwrap().views, 2);
        assert_eq!(find_product(&db, lamp.id).await.unwrap().views, 2);

        let missing = record_view(&db, 9999).await;
        assert!(matches!(missing, Err(CatalogError::ProductNotFound(9999))));
    }

    #[tokio::test]
    async fn test_max_price_and_categories() {
        let db = setup_db().await;
        assert_eq!(max_price(&db).await.unwrap(), None);
        assert!(categories(&db).await.unwrap().is_empty());

        let owner = seed_user(&db, "seller").await;
        seed_product(&db, &owner, "Desk", "office", price("250.50"), 2).await;
        seed_product(&db, &owner, "Novel", "books", price("12"), 1).await;
        seed_product(&db, &owner, "Chair", "office", price("80"), 0).await;

        assert_eq!(max_price(&db).await.unwrap(), Some(price("250.50")));
        assert_eq!(categories(&db).await.unwrap(), vec!["books", "office"]);
    }

    #[tokio::test]
    async fn test_delete_requires_owner() {
        let db = setup_db().await;
        let owner = seed_user(&db, "seller").await;
        let stranger = seed_user(&db, "stranger").await;
        let lamp = seed_product(&db, &owner, "Lamp", "home", price("30"), 0).await;
        add_gallery_image(&db, lamp.id, owner.id, "product_images/a.png".to_string())
            .await
            .unwrap();

        let denied = delete_product(&db, lamp.id, stranger.id).await;
        assert!(matches!(denied, Err(CatalogError::NotOwner { .. })));

        let (deleted, keys) = delete_product(&db, lamp.id, owner.id).await.unwrap();
        assert_eq!(deleted.id, lamp.id);
        assert_eq!(deleted.image.as_deref(), Some("product_images/a.png"));
        assert_eq!(keys, vec!["product_images/a.png".to_string()]);
        assert!(matches!(
            find_product(&db, lamp.id).await,
            Err(CatalogError::ProductNotFound(_))
        ));
        assert!(product_image::Entity::find().all(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_first_gallery_image_becomes_cover() {
        let db = setup_db().await;
        let owner = seed_user(&db, "seller").await;
        let lamp = seed_product(&db, &owner, "Lamp", "home", price("30"), 0).await;

        add_gallery_image(&db, lamp.id, owner.id, "product_images/1.png".to_string())
            .await
            .unwrap();
        add_gallery_image(&db, lamp.id, owner.id, "product_images/2.png".to_string())
            .await
            .unwrap();

        let reloaded = find_product(&db, lamp.id).await.unwrap();
        assert_eq!(reloaded.image.as_deref(), Some("product_images/1.png"));
        assert_eq!(gallery(&db, &reloaded).await.unwrap().len(), 2);
    }
}
