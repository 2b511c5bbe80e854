use snafu::{Location, Snafu};

use crate::model::Username;
use crate::service::retry::{is_transient_request, is_transient_status, Transient};

pub type Result<T, E = ScraperError> = ::std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ScraperError {
    #[snafu(display("invalid scraper endpoint: {source}"))]
    InvalidEndpoint {
        source: url::ParseError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("request resolving `{username}` failed: {source}"))]
    Request {
        username: Username,
        source: reqwest::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("scraper answered {status} while resolving `{username}`"))]
    Status {
        username: Username,
        status: reqwest::StatusCode,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("malformed scraper response for `{username}`: {source}"))]
    InvalidBody {
        username: Username,
        source: reqwest::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("account `{username}` does not exist"))]
    NotFound {
        username: Username,
        #[snafu(implicit)]
        location: Location,
    },
}

impl Transient for ScraperError {
    fn is_transient(&self) -> bool {
        match self {
            ScraperError::Request { source, .. } => is_transient_request(source),
            ScraperError::Status { status, .. } => is_transient_status(*status),
            ScraperError::InvalidEndpoint { .. }
            | ScraperError::InvalidBody { .. }
            | ScraperError::NotFound { .. } => false,
        }
    }
}
