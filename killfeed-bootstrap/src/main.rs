use anyhow::Result;
use clap::Parser;

use killfeed_infrastructure::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "killfeed")]
#[command(about = "Game server log ingestion service", long_about = None)]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<String>,

    /// Run one ingestion tick over every server and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(config) = args.config {
        std::env::set_var("KILLFEED_CONFIG", config);
    }

    let config = AppConfig::load().await?;
    let _log_guard = killfeed_bootstrap::init_tracing(&config)?;

    if args.once {
        return killfeed_bootstrap::lifecycle::run_once(config).await;
    }
    killfeed_bootstrap::run(config).await
}
