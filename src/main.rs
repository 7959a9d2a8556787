use clap::Parser;

use clustergroup::cli::{run, Args};
use clustergroup::config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = if args.command.needs_session() {
        Some(Config::from_env()?)
    } else {
        None
    };

    run(args.command, config).await?;
    Ok(())
}
