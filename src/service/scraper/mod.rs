use std::future::Future;

use derive_new::new;
use serde::Deserialize;
use snafu::{OptionExt as _, ResultExt as _};
use tracing::instrument;
use url::Url;

use crate::model::{UserId, Username};
use crate::service::{endpoint, RetryPolicy, API_KEY_HEADER};

pub use error::*;

mod error;

/// Resolves usernames to the ids the platform uses internally.
pub trait Scraper: Send + Sync {
    fn resolve(&self, username: &Username) -> impl Future<Output = Result<UserId>> + Send;
}

/// HTTP client for the resolution service.
#[derive(Clone, new)]
pub struct ScraperClient {
    http: reqwest::Client,
    base: Url,
    key: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for ScraperClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScraperClient")
            .field("base", &self.base.as_str())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ScraperClient {
    async fn user_info(&self, username: &Username) -> Result<UserId> {
        let url = endpoint(&self.base, "user/info").context(InvalidEndpointSnafu)?;

        let response = self
            .http
            .get(url)
            .query(&[("username", username.as_ref())])
            .header(API_KEY_HEADER, &self.key)
            .send()
            .await
            .context(RequestSnafu { username: username.clone() })?;

        let status = response.status();
        if !status.is_success() {
            return StatusSnafu {
                username: username.clone(),
                status,
            }
            .fail();
        }

        let body: UserInfo = response
            .json()
            .await
            .context(InvalidBodySnafu { username: username.clone() })?;

        body.user
            .map(|user| user.id)
            .context(NotFoundSnafu { username: username.clone() })
    }
}

impl Scraper for ScraperClient {
    #[instrument(skip(self))]
    async fn resolve(&self, username: &Username) -> Result<UserId> {
        tracing::debug!(%username, "resolve username");
        self.retry.run(|| self.user_info(username)).await
    }
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    user: Option<RemoteUser>,
}

#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: UserId,
}
