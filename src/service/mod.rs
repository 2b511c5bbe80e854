use std::time::Duration;

use url::Url;

pub mod fetcher;
pub mod retry;
pub mod scraper;

#[cfg(test)]
pub(crate) mod testing;

pub use fetcher::{Fetcher, FetcherClient, FetcherError, Page};
pub use retry::RetryPolicy;
pub use scraper::{Scraper, ScraperClient, ScraperError};

/// Header both services read the credential from.
pub const API_KEY_HEADER: &str = "x-api-key";

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// The HTTP client shared by the scraper and the fetcher.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// Join `path` onto `base`, treating `base` as a directory even when it lacks the trailing slash.
pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let directory = format!("{}/", base.path());
        base.set_path(&directory);
    }
    base.join(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_base_path() {
        let base = Url::parse("https://api.example.com/v2").unwrap();
        let url = endpoint(&base, "user/info").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v2/user/info");
    }

    #[test]
    fn endpoint_on_directory_base() {
        let base = Url::parse("https://api.example.com/v2/").unwrap();
        let url = endpoint(&base, "user/videos").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v2/user/videos");
    }

    #[test]
    fn endpoint_on_bare_host() {
        let base = Url::parse("https://api.example.com").unwrap();
        let url = endpoint(&base, "user/info").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/user/info");
    }
}
