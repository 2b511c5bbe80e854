use snafu::{Location, Snafu};

use crate::config::ConfigError;
use crate::database::DatabaseError;
use crate::server::ServerError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ApplicationError {
    /// could not read the configuration
    #[snafu(display("invalid configuration: {source}"))]
    ConfigLoad { source: ConfigError },

    #[snafu(display("could not create the log directory: {source}"))]
    LogDirectory {
        source: tracing_appender::rolling::InitError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("could not initialize the logger: {source}"))]
    InitializeLogger {
        source: tracing::subscriber::SetGlobalDefaultError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("could not build the http client: {source}"))]
    HttpClient {
        source: reqwest::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("could not open the registry: {source}"))]
    ConnectDatabase { source: DatabaseError },

    /// The command line was rejected by the parser
    #[snafu(display("{source}"))]
    InvalidArguments { source: clap::Error },

    #[snafu(display("could not print the usage: {source}"))]
    PrintUsage { source: std::io::Error },

    /// `add` was given without a username
    #[snafu(display("no username specified"))]
    MissingUsername,

    #[snafu(display("could not add the username: {source}"))]
    AddUsername { source: ServerError },

    #[snafu(display("could not update the registered usernames: {source}"))]
    UpdateAll { source: ServerError },

    /// Could not read the resolved ids from the registry
    #[snafu(display("could not list the resolved user ids: {source}"))]
    UserIdList { source: ServerError },

    /// Some items failed; every other item still ran to completion.
    #[snafu(display("{operation} failed for {failed} of {total} items"))]
    PartialFailure {
        operation: &'static str,
        failed: usize,
        total: usize,
    },
}
