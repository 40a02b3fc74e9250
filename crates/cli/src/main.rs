//! petchain CLI entry point.

use clap::Parser;

mod commands;

#[derive(Parser)]
#[command(name = "petchain")]
#[command(about = "Pet ownership registry on a proof-of-work ledger", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<commands::Commands>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "petchain_chain=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(cmd) => {
            if let Err(e) = commands::run(cmd) {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("petchain - Pet ownership registry on a proof-of-work ledger");
            println!("Run 'petchain --help' for usage information.");
        }
    }
}
