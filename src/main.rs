use tiktok_archiver::error::ApplicationError;

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenvy::dotenv().ok();

    tiktok_archiver::run(std::env::args_os()).await
}
