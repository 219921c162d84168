mod cli;
mod evaluate;
mod infra;
mod routes;
mod server;

use return_portal::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
