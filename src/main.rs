use std::process::ExitCode;

use clap::Parser;

use mdserve::config::{Args, ServerConfig};
use mdserve::errors::SetupError;
use mdserve::logger::Logger;
use mdserve::server;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR: {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), SetupError> {
    Logger::init()?;
    let config = ServerConfig::from_args(args)?;
    server::serve(config).await
}
