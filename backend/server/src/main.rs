use std::process::ExitCode;

use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    match server::start_server().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server failed: {e}");
            eprintln!("Server failed: {e}");
            ExitCode::FAILURE
        }
    }
}
