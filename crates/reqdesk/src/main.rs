use clap::Parser;
use color_eyre::Result;
#[cfg(not(windows))]
use jemallocator::Jemalloc;
#[cfg(windows)]
use mimalloc::MiMalloc;
use reqdesk_cli::{Cli, Commands, handle_command};

#[cfg(windows)]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[cfg(not(windows))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let config_path = cli.config_path()?;

    // Without a subcommand the server is started with the configured bind address.
    let cmd = cli.command.unwrap_or(Commands::Serve { bind: None, port: None });
    if let Err(err) = handle_command(cmd, config_path).await {
        eprintln!("❌ Error: {err}");
        std::process::exit(1);
    }

    Ok(())
}
