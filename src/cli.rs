use std::ffi::OsString;
use std::future::Future;
use std::num::NonZeroUsize;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use snafu::{ensure, ResultExt as _};

use crate::database::Added;
use crate::error::{
    AddUsernameSnafu, ApplicationError, MissingUsernameSnafu, PartialFailureSnafu,
    PrintUsageSnafu, UpdateAllSnafu, UserIdListSnafu,
};
use crate::model::UserId;
use crate::pool;
use crate::server::{FetchSummary, Server, ServerError, UpdateReport};
use crate::service::{Fetcher, Scraper};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start tracking a username
    Add {
        /// the account handle, with or without the leading `@`
        username: Option<String>,
    },
    /// Resolve every tracked username to its user id
    Update,
    /// Download the videos of every resolved user
    Fetch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Nothing to run, show how to use the program.
    Usage,
    Run(Command),
}

/// Parse the command line. A missing or unknown subcommand asks for the usage instead of failing, anything else
/// clap rejects, such as a second username, is an error.
pub fn parse<I, T>(args: I) -> Result<Invocation, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(Cli {
            command: Some(command),
        }) => Ok(Invocation::Run(command)),
        Ok(Cli { command: None }) => Ok(Invocation::Usage),
        Err(error) if error.kind() == ErrorKind::InvalidSubcommand => Ok(Invocation::Usage),
        Err(error) => Err(error),
    }
}

pub fn print_usage() -> Result<(), ApplicationError> {
    Cli::command().print_help().context(PrintUsageSnafu)
}

/// The facade operations the dispatcher needs.
pub trait Operations {
    fn add_username(&self, username: &str) -> impl Future<Output = Result<Added, ServerError>>;

    fn update_all_once(&self) -> impl Future<Output = Result<UpdateReport, ServerError>>;

    fn user_id_list(&self) -> impl Future<Output = Result<Vec<UserId>, ServerError>>;

    fn fetch_all_videos(
        &self, user_id: &UserId,
    ) -> impl Future<Output = Result<FetchSummary, ServerError>>;

    /// How many users are fetched at the same time.
    fn concurrency(&self) -> NonZeroUsize;
}

impl<S: Scraper, F: Fetcher> Operations for Server<S, F> {
    async fn add_username(&self, username: &str) -> Result<Added, ServerError> {
        Server::add_username(self, username).await
    }

    async fn update_all_once(&self) -> Result<UpdateReport, ServerError> {
        Server::update_all_once(self).await
    }

    async fn user_id_list(&self) -> Result<Vec<UserId>, ServerError> {
        Ok(self.database().user_id_list().await?)
    }

    async fn fetch_all_videos(&self, user_id: &UserId) -> Result<FetchSummary, ServerError> {
        Server::fetch_all_videos(self, user_id).await
    }

    fn concurrency(&self) -> NonZeroUsize {
        self.settings().concurrency
    }
}

pub async fn dispatch<O: Operations>(command: Command, operations: &O) -> Result<(), ApplicationError> {
    match command {
        Command::Add { username: None } => {
            println!("You need to specify a username");
            MissingUsernameSnafu.fail()
        }
        Command::Add {
            username: Some(username),
        } => {
            let added = operations
                .add_username(&username)
                .await
                .context(AddUsernameSnafu)?;

            match added {
                Added::Created(account) => tracing::info!(username = %account.username, "now tracking"),
                Added::AlreadyTracked(account) => {
                    tracing::info!(username = %account.username, "already tracked")
                }
            }
            Ok(())
        }
        Command::Update => update(operations).await,
        Command::Fetch => fetch(operations).await,
    }
}

async fn update<O: Operations>(operations: &O) -> Result<(), ApplicationError> {
    let report = operations.update_all_once().await.context(UpdateAllSnafu)?;

    for (username, error) in report.failed() {
        tracing::error!(%username, %error, "could not update username");
    }

    ensure_complete("update", report.failures(), report.len())
}

/// Fetch the videos of every resolved user, a bounded number at a time. A failing user is reported once all the
/// others are done.
pub async fn fetch<O: Operations>(operations: &O) -> Result<(), ApplicationError> {
    let ids = operations.user_id_list().await.context(UserIdListSnafu)?;
    if ids.is_empty() {
        tracing::warn!("no resolved user ids, run `update` first");
        return Ok(());
    }

    let concurrency = operations.concurrency();
    tracing::info!(
        users = ids.len(),
        concurrency = concurrency.get(),
        "fetching videos"
    );

    let report = pool::run(ids, concurrency, |user_id| async move {
        operations.fetch_all_videos(&user_id).await
    })
    .await;

    for (user_id, summary) in report.succeeded() {
        tracing::info!(%user_id, %summary, "fetch completed");
    }
    for (user_id, error) in report.failed() {
        tracing::error!(%user_id, %error, "fetch failed");
    }

    ensure_complete("fetch", report.failures(), report.len())
}

fn ensure_complete(
    operation: &'static str, failed: usize, total: usize,
) -> Result<(), ApplicationError> {
    ensure!(
        failed == 0,
        PartialFailureSnafu {
            operation,
            failed,
            total
        }
    );
    Ok(())
}
