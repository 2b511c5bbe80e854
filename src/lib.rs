use std::ffi::OsString;

use snafu::ResultExt as _;

use crate::cli::Invocation;
use crate::config::Config;
use crate::database::Database;
use crate::error::{
    ApplicationError, ConfigLoadSnafu, ConnectDatabaseSnafu, HttpClientSnafu, InvalidArgumentsSnafu,
    PrintUsageSnafu,
};
use crate::server::{Server, Settings};
use crate::service::{FetcherClient, RetryPolicy, ScraperClient};

pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod logger;
pub mod model;
pub mod pool;
pub mod server;
pub mod service;

/// Load the configuration from the process environment, parse `args` and run the requested command.
pub async fn run<I, T>(args: I) -> Result<(), ApplicationError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    run_with(std::env::vars(), args).await
}

/// Missing credentials fail before the command line is looked at. Nothing is opened or logged for a usage request.
async fn run_with<V, I, T>(vars: V, args: I) -> Result<(), ApplicationError>
where
    V: IntoIterator<Item = (String, String)>,
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let config = Config::from_vars(vars).context(ConfigLoadSnafu)?;

    let command = match cli::parse(args) {
        Ok(Invocation::Run(command)) => command,
        Ok(Invocation::Usage) => return cli::print_usage(),
        // --help and --version
        Err(error) if !error.use_stderr() => return error.print().context(PrintUsageSnafu),
        Err(error) => return Err(error).context(InvalidArgumentsSnafu),
    };

    let _guard = logger::init(&config)?;
    tracing::debug!(?config, ?command, "starting");

    let http = service::http_client(config.request_timeout).context(HttpClientSnafu)?;
    let retry = RetryPolicy::new(config.retry_attempts);
    let scraper = ScraperClient::new(
        http.clone(),
        config.scraper_url.clone(),
        config.scraper_key.clone(),
        retry,
    );
    let fetcher = FetcherClient::new(
        http,
        config.fetcher_url.clone(),
        config.fetcher_key.clone(),
        config.page_size,
        retry,
    );

    let database = Database::open(&Database::address(&config.database_path))
        .await
        .context(ConnectDatabaseSnafu)?;

    let server = Server::new(database, scraper, fetcher, Settings::from_config(&config));
    let result = cli::dispatch(command, &server).await;
    server.close();

    result
}
