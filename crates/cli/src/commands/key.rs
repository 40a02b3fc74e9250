//! Key management command.

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use petchain_core::Keypair;
use std::fs;
use std::path::PathBuf;

#[derive(Args)]
pub struct KeyArgs {
    #[command(subcommand)]
    command: KeyCommand,
}

#[derive(Subcommand)]
enum KeyCommand {
    /// Generate a new keypair
    New {
        /// Directory to store node data
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,

        /// Name for the key file
        #[arg(short, long)]
        name: Option<String>,
    },
    /// List all keys
    List {
        /// Directory to store node data
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,
    },
}

pub fn run(args: KeyArgs) -> Result<()> {
    match args.command {
        KeyCommand::New { data_dir, name } => new_keypair(data_dir, name),
        KeyCommand::List { data_dir } => list_keys(data_dir),
    }
}

fn new_keypair(data_dir: PathBuf, name: Option<String>) -> Result<()> {
    let keypair = Keypair::generate();
    let fingerprint = keypair.fingerprint();

    let keys_dir = data_dir.join("keys");
    fs::create_dir_all(&keys_dir)?;

    let name = name.unwrap_or_else(|| format!("key_{}", &fingerprint.to_hex()[..8]));
    let key_file = keys_dir.join(format!("{}.json", name));
    if key_file.exists() {
        bail!("Key {} already exists", name);
    }

    println!("{}", "Generated new keypair:".bold().cyan());
    println!();
    println!("  Fingerprint: {}", fingerprint.to_hex().bright_yellow());
    println!(
        "  Public Key:  {}",
        keypair.public_key.to_hex().bright_black()
    );

    let key_json = serde_json::json!({
        "fingerprint": fingerprint.to_hex(),
        "public_key": keypair.public_key.to_hex(),
        "private_key": hex::encode(keypair.private_key()),
    });
    fs::write(&key_file, serde_json::to_string_pretty(&key_json)?)?;

    println!();
    println!(
        "{}  Saved to: {}",
        "✓".green().bold(),
        key_file.display().to_string().bright_black()
    );
    println!();
    println!("{}", "Keep your private key safe!".yellow().bold());

    Ok(())
}

fn list_keys(data_dir: PathBuf) -> Result<()> {
    let keys_dir = data_dir.join("keys");

    if !keys_dir.exists() {
        println!("{}", "No keys found.".yellow());
        println!("Use {} to create a new key.", "petchain key new".bright_cyan());
        return Ok(());
    }

    println!("{}", "Saved Keys:".bold().cyan());
    println!();

    let mut entries: Vec<_> = fs::read_dir(&keys_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    entries.sort();

    let mut count = 0;
    for path in entries {
        let contents = fs::read_to_string(&path)?;
        let json: serde_json::Value = serde_json::from_str(&contents)?;

        if let Some(fingerprint) = json.get("fingerprint").and_then(|v| v.as_str()) {
            count += 1;
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            println!(
                "  {} {}",
                format!("{}:", name).bright_black(),
                fingerprint.bright_yellow()
            );
        }
    }

    if count == 0 {
        println!("  {}", "No keys found.".yellow());
    }

    println!();
    Ok(())
}
