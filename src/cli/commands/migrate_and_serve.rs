use anyhow::Result;
use tracing::{info, trace};

use super::initdb::init_database;
use super::serve::serve;

pub async fn migrate_and_serve(database_url: &str, bind_address: &str) -> Result<()> {
    trace!("Entering migrate_and_serve function");
    info!("Applying database migrations before serving");

    init_database(database_url).await?;
    serve(database_url, bind_address).await
}
