//! Schema migration command.
//!
//! Connecting runs the idempotent migrations; running it twice is harmless.

use anyhow::Result;

pub(crate) async fn run() -> Result<()> {
    let url = crate::get_database_url()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set for migrate"))?;
    let embedder = crate::open_embedder()?;
    let dimension = embedder.dimension();
    novelmill_storage::PgStorage::new(&url, dimension).await?;
    println!("migrations applied (embedding dimension {dimension})");
    Ok(())
}
