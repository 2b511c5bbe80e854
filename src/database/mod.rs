use snafu::ResultExt as _;
use surrealdb::{engine::any::Any, Surreal};

pub use accounts::Added;
pub use error::*;
pub use query::Bindings;

mod accounts;
mod error;
mod query;
mod videos;

const NAMESPACE: &str = "tiktok";
const DATABASE: &str = "archive";

const SCHEMA: &str = include_str!("../../schema.surrealql");

/// The embedded registry of tracked accounts and their videos.
///
/// Cloning is cheap, every clone talks to the same datastore.
#[derive(Debug, Clone)]
pub struct Database {
    database: Surreal<Any>,
}

impl Database {
    /// Address of the on-disk store for the given directory.
    pub fn address(path: &std::path::Path) -> String {
        format!("rocksdb://{}", path.display())
    }

    /// Open the datastore at `address` (`rocksdb://...` on disk, `mem://` for a throwaway one) and make sure the
    /// schema exists.
    #[tracing::instrument]
    pub async fn open(address: &str) -> Result<Self> {
        let database = surrealdb::engine::any::connect(address)
            .await
            .context(DatabaseConnectionSnafu { address })?;

        database
            .use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .context(DatabaseConnectionSnafu { address })?;

        let database = Self { database };
        database.sql(SCHEMA).execute().await?;

        tracing::info!(address, "opened database");
        Ok(database)
    }

    /// Release this handle. The datastore is flushed once the last clone is gone.
    pub fn close(self) {
        tracing::debug!("closing database");
        drop(self.database);
    }

    /// Create a builder to execute arbitrary SurrealQL on the database.
    pub fn sql(&self, query: &str) -> Bindings<'_> {
        Bindings::new(self.database.query(query))
    }
}

#[cfg(test)]
pub(crate) async fn in_memory() -> Database {
    Database::open("mem://").await.expect("in-memory database")
}
