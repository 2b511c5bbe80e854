use tracing::instrument;

use super::*;
use crate::model::{now, Account, UserId, Username};

const ACCOUNT_FIELDS: &str = "username, user_id, created_at, resolved_at, fetched_at";

/// Outcome of registering a username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Added {
    Created(Account),
    AlreadyTracked(Account),
}

impl Added {
    pub fn account(&self) -> &Account {
        match self {
            Added::Created(account) | Added::AlreadyTracked(account) => account,
        }
    }
}

impl Database {
    /// Start tracking `username`. Registering a name twice keeps the first entry untouched.
    #[instrument(skip(self))]
    pub async fn add_account(&self, username: &Username) -> Result<Added> {
        if let Some(existing) = self.account(username).await? {
            return Ok(Added::AlreadyTracked(existing));
        }

        let account = Account::new(username.clone());
        self.sql("CREATE type::thing('accounts', $username) CONTENT $account RETURN NONE")
            .bind(("username", username.as_ref()))
            .bind(("account", &account))
            .execute()
            .await?;

        tracing::info!(%username, "registered account");
        Ok(Added::Created(account))
    }

    pub async fn account(&self, username: &Username) -> Result<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_FIELDS} FROM type::thing('accounts', $username)");
        let mut accounts: Vec<Account> = self
            .sql(&query)
            .bind(("username", username.as_ref()))
            .fetch_first()
            .await?;

        Ok(accounts.pop())
    }

    /// Every registry entry, ordered by username.
    pub async fn accounts(&self) -> Result<Vec<Account>> {
        let query = format!("SELECT {ACCOUNT_FIELDS} FROM accounts ORDER BY username");
        self.sql(&query).fetch_first().await
    }

    #[instrument(skip(self))]
    pub async fn set_user_id(&self, username: &Username, user_id: &UserId) -> Result<()> {
        self.sql(
            "UPDATE type::thing('accounts', $username) \
             SET user_id = $user_id, resolved_at = $resolved_at RETURN NONE",
        )
        .bind(("username", username.as_ref()))
        .bind(("user_id", user_id))
        .bind(("resolved_at", now()))
        .execute()
        .await?;

        Ok(())
    }

    /// Record that a fetch run for `user_id` went through.
    #[instrument(skip(self))]
    pub async fn mark_fetched(&self, user_id: &UserId) -> Result<()> {
        self.sql("UPDATE accounts SET fetched_at = $fetched_at WHERE user_id = $user_id RETURN NONE")
            .bind(("user_id", user_id))
            .bind(("fetched_at", now()))
            .execute()
            .await?;

        Ok(())
    }

    /// Ids of every resolved account, sorted and without duplicates. Accounts that `update` has not resolved yet
    /// are left out.
    pub async fn user_id_list(&self) -> Result<Vec<UserId>> {
        let accounts = self.accounts().await?;
        let total = accounts.len();

        let mut ids: Vec<UserId> = accounts
            .into_iter()
            .filter_map(|account| account.user_id)
            .collect();

        if ids.len() < total {
            tracing::info!(
                unresolved = total - ids.len(),
                "skipping accounts without a resolved user id"
            );
        }

        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}
