// warmpack entry point

use clap::Parser;
use tracing::error;
use warmpack_cli::{logging, Cli};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level, cli.debug)?;

    match warmpack_cli::run(&cli).await {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!(error = %e, "Worker failed");
            Err(anyhow::anyhow!(e.user_message()))
        }
    }
}
