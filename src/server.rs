use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use derive_new::new;
use serde::Serialize;
use snafu::{Location, ResultExt as _, Snafu};
use tracing::instrument;

use crate::config::Config;
use crate::database::{Added, Database, DatabaseError};
use crate::model::{ParseUsername, UserId, Username, Video};
use crate::pool::{self, Report};
use crate::service::{Fetcher, FetcherError, Page, Scraper, ScraperError};

/// Per-username outcome of [Server::update_all_once].
pub type UpdateReport = Report<Username, Resolution, ServerError>;

/// Knobs of the facade that do not belong to either service.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Settings {
    pub output_dir: PathBuf,
    pub concurrency: NonZeroUsize,
    pub download: bool,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.output_dir.clone(),
            config.fetch_concurrency(),
            config.download_videos,
        )
    }
}

/// Ties the registry to the scraper and the fetcher.
#[derive(Debug, new)]
pub struct Server<S, F> {
    database: Database,
    scraper: S,
    fetcher: F,
    settings: Settings,
}

impl<S: Scraper, F: Fetcher> Server<S, F> {
    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Start tracking a username typed by the operator.
    #[instrument(skip(self))]
    pub async fn add_username(&self, username: &str) -> Result<Added, ServerError> {
        let username: Username = username.parse().context(InvalidUsernameSnafu)?;
        let added = self.database.add_account(&username).await?;

        if let Added::AlreadyTracked(account) = &added {
            tracing::info!(%username, user_id = ?account.user_id, "username is already tracked");
        }

        Ok(added)
    }

    /// Resolve every registered username once and store the ids.
    ///
    /// Every entry is attempted; the report tells which ones failed.
    #[instrument(skip(self))]
    pub async fn update_all_once(&self) -> Result<UpdateReport, ServerError> {
        let accounts = self.database.accounts().await?;
        if accounts.is_empty() {
            tracing::warn!("no usernames registered, run `add` first");
        }

        let previous: HashMap<Username, Option<UserId>> = accounts
            .into_iter()
            .map(|account| (account.username, account.user_id))
            .collect();
        let usernames: Vec<Username> = previous.keys().cloned().collect();

        let report = pool::run(usernames, self.settings.concurrency, |username| {
            let known = previous.get(&username).cloned().flatten();
            async move { self.resolve(username, known).await }
        })
        .await;

        tracing::info!(
            total = report.len(),
            failed = report.failures(),
            "updated registered usernames"
        );
        Ok(report)
    }

    async fn resolve(
        &self, username: Username, previous: Option<UserId>,
    ) -> Result<Resolution, ServerError> {
        let user_id = self
            .scraper
            .resolve(&username)
            .await
            .context(ResolveSnafu { username: username.clone() })?;

        self.database.set_user_id(&username, &user_id).await?;

        let resolution = match previous {
            None => Resolution::Resolved(user_id),
            Some(old) if old == user_id => Resolution::Unchanged(user_id),
            Some(old) => Resolution::Changed {
                from: old,
                to: user_id,
            },
        };

        match &resolution {
            Resolution::Changed { from, to } => {
                tracing::warn!(%username, %from, %to, "user id changed")
            }
            resolution => {
                tracing::info!(%username, user_id = %resolution.user_id(), "resolved username")
            }
        }

        Ok(resolution)
    }

    /// Walk every page of `user_id`'s videos and store, and download, the ones not seen before.
    #[instrument(skip(self))]
    pub async fn fetch_all_videos(&self, user_id: &UserId) -> Result<FetchSummary, ServerError> {
        let directory = self.settings.output_dir.join(user_id.directory_name());
        let mut summary = FetchSummary::default();
        let mut cursor: Option<String> = None;
        let mut seen_cursors = HashSet::new();

        loop {
            let page = self
                .fetcher
                .videos(user_id, cursor.as_deref())
                .await
                .context(ListVideosSnafu { user_id: user_id.clone() })?;
            summary.pages += 1;

            let Page {
                videos,
                cursor: next,
                has_more,
            } = page;
            let empty = videos.is_empty();

            for video in videos {
                summary.seen += 1;
                if self.database.video_exists(&video.video_id).await? {
                    continue;
                }
                self.store(video, &directory, &mut summary).await?;
            }

            // a cursor handed out twice means the service is going around in circles
            match next {
                Some(next) if has_more && !empty && seen_cursors.insert(next.clone()) => {
                    cursor = Some(next)
                }
                Some(next) if has_more && !empty => {
                    tracing::warn!(%user_id, cursor = %next, "cursor repeated, stopping pagination");
                    break;
                }
                _ => break,
            }
        }

        self.database.mark_fetched(user_id).await?;

        tracing::info!(%user_id, %summary, "fetched videos");
        Ok(summary)
    }

    /// Metadata is only saved after the content is on disk, so a failed download is retried on the next run.
    async fn store(
        &self, mut video: Video, directory: &Path, summary: &mut FetchSummary,
    ) -> Result<(), ServerError> {
        if self.settings.download && video.play_url.is_some() {
            let destination = directory.join(video.video_id.file_name());
            let bytes = self
                .fetcher
                .download(&video, &destination)
                .await
                .context(DownloadSnafu { video_id: video.video_id.to_string() })?;

            summary.downloaded += 1;
            summary.bytes += bytes;
            video.file = Some(destination);
        } else if video.play_url.is_none() {
            tracing::debug!(video_id = %video.video_id, "no play url, keeping metadata only");
        }

        self.database.save_video(&video).await?;
        summary.new += 1;
        Ok(())
    }

    pub fn close(self) {
        self.database.close();
    }
}

/// What [Server::update_all_once] learned about one username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// First time this username was resolved.
    Resolved(UserId),
    Unchanged(UserId),
    Changed { from: UserId, to: UserId },
}

impl Resolution {
    pub fn user_id(&self) -> &UserId {
        match self {
            Resolution::Resolved(user_id) | Resolution::Unchanged(user_id) => user_id,
            Resolution::Changed { to, .. } => to,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchSummary {
    pub pages: usize,
    /// Videos listed by the service, known or not.
    pub seen: usize,
    pub new: usize,
    pub downloaded: usize,
    pub bytes: u64,
}

impl std::fmt::Display for FetchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} new of {} videos over {} pages, {} downloaded ({} bytes)",
            self.new, self.seen, self.pages, self.downloaded, self.bytes
        )
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ServerError {
    #[snafu(display("{source}"))]
    InvalidUsername {
        source: ParseUsername,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(transparent)]
    Database { source: DatabaseError },

    #[snafu(display("could not resolve `{username}`: {source}"))]
    Resolve {
        username: Username,
        source: ScraperError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("could not list the videos of `{user_id}`: {source}"))]
    ListVideos {
        user_id: UserId,
        source: FetcherError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("could not download video `{video_id}`: {source}"))]
    Download {
        video_id: String,
        source: FetcherError,
        #[snafu(implicit)]
        location: Location,
    },
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use tempfile::TempDir;

    use crate::database::in_memory;
    use crate::model::{Timestamp, VideoId};
    use crate::service::fetcher::StatusSnafu;
    use crate::service::scraper::NotFoundSnafu;

    use super::*;

    /// Resolves the names it was given, anything else does not exist.
    #[derive(Debug, Default)]
    pub(crate) struct FakeScraper {
        pub ids: Mutex<HashMap<String, String>>,
        pub calls: Mutex<Vec<Username>>,
    }

    impl FakeScraper {
        pub fn with(ids: &[(&str, &str)]) -> Self {
            let ids = ids
                .iter()
                .map(|(name, id)| (name.to_string(), id.to_string()))
                .collect();
            Self {
                ids: Mutex::new(ids),
                calls: Mutex::default(),
            }
        }
    }

    impl Scraper for FakeScraper {
        async fn resolve(&self, username: &Username) -> Result<UserId, ScraperError> {
            self.calls.lock().unwrap().push(username.clone());
            let id = self.ids.lock().unwrap().get(username.as_ref()).cloned();
            match id {
                Some(id) => Ok(UserId::new(id)),
                None => NotFoundSnafu {
                    username: username.clone(),
                }
                .fail(),
            }
        }
    }

    /// Serves fixed pages per user and writes the video id as the file content.
    #[derive(Debug, Default)]
    pub(crate) struct FakeFetcher {
        pub pages: BTreeMap<String, Vec<Page>>,
        pub requested: Mutex<Vec<(UserId, Option<String>)>>,
        pub downloads: Mutex<Vec<PathBuf>>,
        pub broken_downloads: Vec<String>,
    }

    impl Fetcher for FakeFetcher {
        async fn videos(&self, user_id: &UserId, cursor: Option<&str>) -> Result<Page, FetcherError> {
            self.requested
                .lock()
                .unwrap()
                .push((user_id.clone(), cursor.map(str::to_string)));

            let pages = self.pages.get(user_id.as_ref()).cloned().unwrap_or_default();
            let index = match cursor {
                None => 0,
                Some(cursor) => cursor.trim_start_matches("page-").parse().unwrap(),
            };

            match pages.get(index) {
                Some(page) => Ok(page.clone()),
                None => StatusSnafu {
                    target: format!("page {index} of `{user_id}`"),
                    status: reqwest::StatusCode::NOT_FOUND,
                }
                .fail(),
            }
        }

        async fn download(&self, video: &Video, destination: &Path) -> Result<u64, FetcherError> {
            if self.broken_downloads.contains(&video.video_id.to_string()) {
                return StatusSnafu {
                    target: format!("content of `{}`", video.video_id),
                    status: reqwest::StatusCode::FORBIDDEN,
                }
                .fail();
            }

            let content = video.video_id.to_string();
            std::fs::create_dir_all(destination.parent().unwrap()).unwrap();
            std::fs::write(destination, &content).unwrap();
            self.downloads
                .lock()
                .unwrap()
                .push(destination.to_path_buf());
            Ok(content.len() as u64)
        }
    }

    pub(crate) fn video(id: &str, user: &str) -> Video {
        Video::new(
            VideoId::new(id),
            UserId::new(user),
            format!("video {id}"),
            Timestamp::from_unix(1_700_000_000),
            Some(format!("https://cdn.example.com/{id}.mp4").parse().unwrap()),
        )
    }

    /// Pages cursor-chained as `page-1`, `page-2`...; the last one has no more.
    pub(crate) fn pages(user: &str, ids: &[&[&str]]) -> Vec<Page> {
        ids.iter()
            .enumerate()
            .map(|(index, page)| {
                let videos = page.iter().map(|id| video(id, user)).collect();
                let has_more = index + 1 < ids.len();
                let cursor = has_more.then(|| format!("page-{}", index + 1));
                Page::new(videos, cursor, has_more)
            })
            .collect()
    }

    /// The output directory is removed when the returned [TempDir] is dropped.
    async fn server(
        scraper: FakeScraper, fetcher: FakeFetcher,
    ) -> (Server<FakeScraper, FakeFetcher>, TempDir) {
        let output_dir = tempfile::tempdir().unwrap();
        let settings = Settings::new(
            output_dir.path().to_path_buf(),
            NonZeroUsize::new(2).unwrap(),
            true,
        );
        let server = Server::new(in_memory().await, scraper, fetcher, settings);
        (server, output_dir)
    }

    #[tokio::test]
    async fn add_username_normalises_and_registers() {
        let (server, _output_dir) = server(FakeScraper::default(), FakeFetcher::default()).await;

        let added = server.add_username(" @alice ").await.unwrap();
        assert!(matches!(added, Added::Created(_)));
        assert_eq!(added.account().username.as_ref(), "alice");

        let again = server.add_username("alice").await.unwrap();
        assert!(matches!(again, Added::AlreadyTracked(_)));
    }

    #[tokio::test]
    async fn add_username_rejects_garbage() {
        let (server, _output_dir) = server(FakeScraper::default(), FakeFetcher::default()).await;

        let error = server.add_username("two words").await.unwrap_err();
        assert!(matches!(error, ServerError::InvalidUsername { .. }));
        assert!(server.database().accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_resolves_every_username_and_reports_failures() {
        let scraper = FakeScraper::with(&[("alice", "100"), ("bob", "200")]);
        let (server, _output_dir) = server(scraper, FakeFetcher::default()).await;
        for name in ["alice", "bob", "ghost"] {
            server.add_username(name).await.unwrap();
        }

        let report = server.update_all_once().await.unwrap();

        assert_eq!(report.len(), 3);
        assert_eq!(report.failures(), 1);
        let ghost: Username = "ghost".parse().unwrap();
        assert!(matches!(
            report.get(&ghost),
            Some(Err(ServerError::Resolve { .. }))
        ));

        let ids = server.database().user_id_list().await.unwrap();
        assert_eq!(ids, vec![UserId::new("100"), UserId::new("200")]);
        assert_eq!(server.scraper.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn update_detects_changed_ids() {
        let scraper = FakeScraper::with(&[("alice", "100"), ("bob", "200")]);
        let (server, _output_dir) = server(scraper, FakeFetcher::default()).await;
        server.add_username("alice").await.unwrap();
        server.add_username("bob").await.unwrap();
        server.update_all_once().await.unwrap();

        server
            .scraper
            .ids
            .lock()
            .unwrap()
            .insert("bob".to_string(), "201".to_string());
        let report = server.update_all_once().await.unwrap();

        let alice: Username = "alice".parse().unwrap();
        let bob: Username = "bob".parse().unwrap();
        assert_eq!(
            report.get(&alice).unwrap().as_ref().unwrap(),
            &Resolution::Unchanged(UserId::new("100"))
        );
        assert_eq!(
            report.get(&bob).unwrap().as_ref().unwrap(),
            &Resolution::Changed {
                from: UserId::new("200"),
                to: UserId::new("201")
            }
        );
    }

    #[tokio::test]
    async fn update_with_empty_registry_is_empty() {
        let (server, _output_dir) = server(FakeScraper::default(), FakeFetcher::default()).await;
        let report = server.update_all_once().await.unwrap();
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn fetch_walks_every_page_and_downloads() {
        let fetcher = FakeFetcher {
            pages: BTreeMap::from([("100".to_string(), pages("100", &[&["3", "2"], &["1"]]))]),
            ..FakeFetcher::default()
        };
        let (server, output_dir) = server(FakeScraper::default(), fetcher).await;

        let summary = server.fetch_all_videos(&UserId::new("100")).await.unwrap();

        assert_eq!(
            summary,
            FetchSummary {
                pages: 2,
                seen: 3,
                new: 3,
                downloaded: 3,
                bytes: 3,
            }
        );

        let requested = server.fetcher.requested.lock().unwrap().clone();
        assert_eq!(
            requested,
            vec![
                (UserId::new("100"), None),
                (UserId::new("100"), Some("page-1".to_string()))
            ]
        );

        let file = output_dir.path().join("100").join("2.mp4");
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "2");

        let stored = server.database().videos_of(&UserId::new("100")).await.unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[1].file, Some(file));
    }

    #[tokio::test]
    async fn known_videos_are_not_downloaded_again() {
        let fetcher = FakeFetcher {
            pages: BTreeMap::from([("100".to_string(), pages("100", &[&["2", "1"]]))]),
            ..FakeFetcher::default()
        };
        let (server, _output_dir) = server(FakeScraper::default(), fetcher).await;

        server.fetch_all_videos(&UserId::new("100")).await.unwrap();
        let second = server.fetch_all_videos(&UserId::new("100")).await.unwrap();

        assert_eq!(second.seen, 2);
        assert_eq!(second.new, 0);
        assert_eq!(second.downloaded, 0);
        assert_eq!(server.fetcher.downloads.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_download_is_not_recorded() {
        let fetcher = FakeFetcher {
            pages: BTreeMap::from([("100".to_string(), pages("100", &[&["1", "2"]]))]),
            broken_downloads: vec!["2".to_string()],
            ..FakeFetcher::default()
        };
        let (server, _output_dir) = server(FakeScraper::default(), fetcher).await;

        let error = server.fetch_all_videos(&UserId::new("100")).await.unwrap_err();
        assert!(matches!(error, ServerError::Download { .. }));

        assert!(server.database().video_exists(&VideoId::new("1")).await.unwrap());
        assert!(!server.database().video_exists(&VideoId::new("2")).await.unwrap());
    }

    #[tokio::test]
    async fn videos_without_play_url_keep_metadata_only() {
        let mut page = pages("100", &[&["1"]]);
        page[0].videos[0].play_url = None;
        let fetcher = FakeFetcher {
            pages: BTreeMap::from([("100".to_string(), page)]),
            ..FakeFetcher::default()
        };
        let (server, _output_dir) = server(FakeScraper::default(), fetcher).await;

        let summary = server.fetch_all_videos(&UserId::new("100")).await.unwrap();

        assert_eq!(summary.new, 1);
        assert_eq!(summary.downloaded, 0);
        let stored = server.database().videos_of(&UserId::new("100")).await.unwrap();
        assert_eq!(stored[0].file, None);
    }

    #[tokio::test]
    async fn repeated_cursor_stops_pagination() {
        let looping = Page::new(vec![video("1", "100")], Some("page-0".to_string()), true);
        let fetcher = FakeFetcher {
            pages: BTreeMap::from([("100".to_string(), vec![looping])]),
            ..FakeFetcher::default()
        };
        let (server, _output_dir) = server(FakeScraper::default(), fetcher).await;

        let summary = server.fetch_all_videos(&UserId::new("100")).await.unwrap();

        assert_eq!(summary.pages, 2);
        assert_eq!(summary.new, 1);
    }

    #[tokio::test]
    async fn cursor_cycle_stops_pagination() {
        let first = Page::new(vec![video("1", "100")], Some("page-1".to_string()), true);
        let second = Page::new(vec![video("2", "100")], Some("page-0".to_string()), true);
        let fetcher = FakeFetcher {
            pages: BTreeMap::from([("100".to_string(), vec![first, second])]),
            ..FakeFetcher::default()
        };
        let (server, _output_dir) = server(FakeScraper::default(), fetcher).await;

        let summary = server.fetch_all_videos(&UserId::new("100")).await.unwrap();

        assert_eq!(summary.pages, 3);
        assert_eq!(summary.new, 2);
        let cursors: Vec<Option<String>> = server
            .fetcher
            .requested
            .lock()
            .unwrap()
            .iter()
            .map(|(_, cursor)| cursor.clone())
            .collect();
        assert_eq!(
            cursors,
            [None, Some("page-1".to_string()), Some("page-0".to_string())]
        );
    }

    #[tokio::test]
    async fn downloads_stay_inside_the_output_dir() {
        let hostile = "../../escaped";
        let fetcher = FakeFetcher {
            pages: BTreeMap::from([(hostile.to_string(), pages(hostile, &[&["1"]]))]),
            ..FakeFetcher::default()
        };
        let (server, output_dir) = server(FakeScraper::default(), fetcher).await;

        server.fetch_all_videos(&UserId::new(hostile)).await.unwrap();

        let downloads = server.fetcher.downloads.lock().unwrap().clone();
        assert_eq!(
            downloads,
            [output_dir.path().join("%2E%2E%2F%2E%2E%2Fescaped").join("1.mp4")]
        );
        let root = output_dir.path().canonicalize().unwrap();
        assert!(downloads[0].canonicalize().unwrap().starts_with(root));
    }

    #[tokio::test]
    async fn fetch_marks_the_account() {
        let scraper = FakeScraper::with(&[("alice", "100")]);
        let fetcher = FakeFetcher {
            pages: BTreeMap::from([("100".to_string(), pages("100", &[&[]]))]),
            ..FakeFetcher::default()
        };
        let (server, _output_dir) = server(scraper, fetcher).await;
        server.add_username("alice").await.unwrap();
        server.update_all_once().await.unwrap();

        server.fetch_all_videos(&UserId::new("100")).await.unwrap();

        let alice = server
            .database()
            .account(&"alice".parse().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(alice.fetched_at.is_some());
    }
}
