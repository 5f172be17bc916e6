mod cli;
mod commands;
mod infra;

use summer_lottery::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
