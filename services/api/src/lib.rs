mod cli;
mod infra;
mod routes;
mod run;
mod server;

use placement_desk::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
