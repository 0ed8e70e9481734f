use clap::Parser;
use sclm_cli::logging::init_logging;
use sclm_cli::{AppError, Args};
use sclm_core::context::{save_config, save_config_to};
use tracing::error;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let guard = init_logging(args.debug);

    let code = match start(&args).await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "Exiting");
            eprintln!("error: {e}");
            1
        }
    };

    // Flush buffered log lines before exiting
    drop(guard);
    std::process::exit(code);
}

async fn start(args: &Args) -> Result<(), AppError> {
    let config = args.resolve_config()?;

    if args.save_config {
        match &args.config {
            Some(path) => save_config_to(path, &config)?,
            None => save_config(&config)?,
        }
    }

    sclm_cli::run(config).await
}
