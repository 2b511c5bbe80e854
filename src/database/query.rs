use derive_new::new;
use serde::de::DeserializeOwned;
use snafu::ResultExt as _;
use surrealdb::engine::any::Any;
use surrealdb::opt::QueryResult;

use super::*;

/// A raw SurrealQL query. Parameters are bound with [Bindings::bind] which takes any serializable value.
///
/// # Example
/// ```ignore
/// let accounts: Vec<Account> = database.sql("SELECT * FROM accounts WHERE user_id = $user_id")
///     .bind(("user_id", "6881290705605477381"))
///     .fetch_first()
///     .await?;
/// ```
#[derive(Debug, new)]
pub struct Bindings<'a> {
    query: surrealdb::method::Query<'a, Any>,
}

impl Bindings<'_> {
    pub fn bind(mut self, params: impl serde::Serialize) -> Self {
        let query = self.query;
        self.query = query.bind(params);
        self
    }

    /// Execute every statement and fail on the first one that errored.
    pub async fn execute(self) -> Result<surrealdb::Response> {
        let response = self
            .query
            .await
            .context(DatabaseQuerySnafu)?
            .check()
            .context(DatabaseQuerySnafu)?;
        tracing::trace!(?response, "executed query");
        Ok(response)
    }

    /// Execute the query and deserialize the result of the first statement.
    pub async fn fetch_first<T: DeserializeOwned>(self) -> Result<T>
    where
        usize: QueryResult<T>,
    {
        let mut statements = self.execute().await?;
        let result = statements.take::<T>(0).context(DatabaseDeserializeSnafu)?;
        Ok(result)
    }
}
