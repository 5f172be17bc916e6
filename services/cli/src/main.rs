use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match summer_lottery_cli::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("summer-lottery: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
