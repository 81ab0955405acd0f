use model::entities::profile;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tracing::{debug, instrument};

use crate::error::Result;

pub async fn find_profile<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
) -> Result<Option<profile::Model>> {
    Ok(profile::Entity::find()
        .filter(profile::Column::UserId.eq(user_id))
        .one(db)
        .await?)
}

/// Points the user's profile at a newly stored image, creating the profile if needed.
///
/// Returns the key of the image it replaced.
#[instrument(skip(db))]
pub async fn set_profile_image<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    image_key: String,
) -> Result<Option<String>> {
    match find_profile(db, user_id).await? {
        Some(existing) => {
            let previous = existing.image.clone();
            let mut active: profile::ActiveModel = existing.into();
            active.image = Set(Some(image_key));
            active.update(db).await?;
            debug!("Replaced profile image of user {}", user_id);
            Ok(previous)
        }
        None => {
            profile::ActiveModel {
                user_id: Set(user_id),
                image: Set(Some(image_key)),
                ..Default::default()
            }
            .insert(db)
            .await?;
            debug!("Created profile for user {}", user_id);
            Ok(None)
        }
    }
}
