mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use mentorhub::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
