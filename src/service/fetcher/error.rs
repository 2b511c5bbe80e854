use std::path::PathBuf;

use snafu::{Location, Snafu};

use crate::model::VideoId;
use crate::service::retry::{is_transient_request, is_transient_status, Transient};

pub type Result<T, E = FetcherError> = ::std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FetcherError {
    #[snafu(display("invalid fetcher endpoint: {source}"))]
    InvalidEndpoint {
        source: url::ParseError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("request for {target} failed: {source}"))]
    Request {
        target: String,
        source: reqwest::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("fetcher answered {status} for {target}"))]
    Status {
        target: String,
        status: reqwest::StatusCode,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("malformed fetcher response for {target}: {source}"))]
    InvalidBody {
        target: String,
        source: reqwest::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("video `{video_id}` has no play url"))]
    NoPlayUrl {
        video_id: VideoId,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("cannot write `{}`: {source}", path.display()))]
    Write {
        path: PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

impl Transient for FetcherError {
    fn is_transient(&self) -> bool {
        match self {
            FetcherError::Request { source, .. } => is_transient_request(source),
            FetcherError::Status { status, .. } => is_transient_status(*status),
            FetcherError::InvalidEndpoint { .. }
            | FetcherError::InvalidBody { .. }
            | FetcherError::NoPlayUrl { .. }
            | FetcherError::Write { .. } => false,
        }
    }
}
