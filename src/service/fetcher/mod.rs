use std::future::Future;
use std::path::{Path, PathBuf};

use derive_new::new;
use futures::StreamExt as _;
use serde::Deserialize;
use snafu::{OptionExt as _, ResultExt as _};
use tokio::io::AsyncWriteExt as _;
use tracing::instrument;
use url::Url;

use crate::model::{Timestamp, UserId, Video, VideoId};
use crate::service::{endpoint, RetryPolicy, API_KEY_HEADER};

pub use error::*;

mod error;

/// One page of a user's videos, newest first.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Page {
    pub videos: Vec<Video>,
    /// Opaque position to continue from.
    pub cursor: Option<String>,
    pub has_more: bool,
}

/// Lists and downloads the videos of a resolved user.
pub trait Fetcher: Send + Sync {
    fn videos(
        &self, user_id: &UserId, cursor: Option<&str>,
    ) -> impl Future<Output = Result<Page>> + Send;

    /// Write the content of `video` to `destination` and return the number of bytes written.
    fn download(&self, video: &Video, destination: &Path)
        -> impl Future<Output = Result<u64>> + Send;
}

/// HTTP client for the video service.
#[derive(Clone, new)]
pub struct FetcherClient {
    http: reqwest::Client,
    base: Url,
    key: String,
    page_size: u32,
    retry: RetryPolicy,
}

impl std::fmt::Debug for FetcherClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetcherClient")
            .field("base", &self.base.as_str())
            .field("page_size", &self.page_size)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl FetcherClient {
    async fn page(&self, user_id: &UserId, cursor: Option<&str>) -> Result<Page> {
        let url = endpoint(&self.base, "user/videos").context(InvalidEndpointSnafu)?;
        let target = format!("videos of `{user_id}`");

        let mut request = self
            .http
            .get(url)
            .query(&[("user_id", user_id.as_ref())])
            .query(&[("count", self.page_size)])
            .header(API_KEY_HEADER, &self.key);

        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }

        let response = request.send().await.context(RequestSnafu { target: &target })?;

        let status = response.status();
        if !status.is_success() {
            return StatusSnafu { target, status }.fail();
        }

        let body: VideoList = response
            .json()
            .await
            .context(InvalidBodySnafu { target })?;

        Ok(body.into_page(user_id))
    }

    async fn stream_to_file(&self, url: &Url, video: &Video, destination: &Path) -> Result<u64> {
        let target = format!("content of `{}`", video.video_id);

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .context(RequestSnafu { target: &target })?;

        let status = response.status();
        if !status.is_success() {
            return StatusSnafu { target, status }.fail();
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context(WriteSnafu { path: parent })?;
        }

        // written under a temporary name so an interrupted download never looks complete
        let partial = partial_path(destination);
        let written = match write_body(response, &partial, &target).await {
            Ok(written) => written,
            Err(error) => {
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                    tracing::warn!(path = %partial.display(), %cleanup, "could not remove partial download");
                }
                return Err(error);
            }
        };

        tokio::fs::rename(&partial, destination)
            .await
            .context(WriteSnafu { path: destination })?;

        Ok(written)
    }
}

impl Fetcher for FetcherClient {
    #[instrument(skip(self))]
    async fn videos(&self, user_id: &UserId, cursor: Option<&str>) -> Result<Page> {
        tracing::debug!(%user_id, ?cursor, "fetch video page");
        self.retry.run(|| self.page(user_id, cursor)).await
    }

    #[instrument(skip(self, video), fields(video_id = %video.video_id))]
    async fn download(&self, video: &Video, destination: &Path) -> Result<u64> {
        let url = video.play_url.as_ref().context(NoPlayUrlSnafu {
            video_id: video.video_id.clone(),
        })?;

        tracing::debug!(%url, destination = %destination.display(), "download video");
        self.retry
            .run(|| self.stream_to_file(url, video, destination))
            .await
    }
}

async fn write_body(response: reqwest::Response, partial: &Path, target: &str) -> Result<u64> {
    let mut file = tokio::fs::File::create(partial)
        .await
        .context(WriteSnafu { path: partial })?;

    let mut written = 0u64;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.context(RequestSnafu { target })?;
        file.write_all(&chunk)
            .await
            .context(WriteSnafu { path: partial })?;
        written += chunk.len() as u64;
    }

    file.flush().await.context(WriteSnafu { path: partial })?;
    Ok(written)
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

#[derive(Debug, Deserialize)]
struct VideoList {
    #[serde(default)]
    videos: Vec<RemoteVideo>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct RemoteVideo {
    id: VideoId,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    create_time: Option<i64>,
    #[serde(default)]
    play_url: Option<String>,
}

impl VideoList {
    fn into_page(self, user_id: &UserId) -> Page {
        let videos = self
            .videos
            .into_iter()
            .map(|remote| {
                let play_url = remote
                    .play_url
                    .as_deref()
                    .filter(|url| !url.is_empty())
                    .and_then(|url| Url::parse(url).ok());

                Video::new(
                    remote.id,
                    user_id.clone(),
                    remote.desc,
                    remote.create_time.and_then(Timestamp::from_unix),
                    play_url,
                )
            })
            .collect();

        Page::new(videos, self.cursor.filter(|c| !c.is_empty()), self.has_more)
    }
}
