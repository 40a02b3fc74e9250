//! Pet registry commands.

use super::{format_timestamp, load_keypair, open_node, print_receipt, save_pending};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::{ColoredString, Colorize};
use petchain_chain::{NodeState, PetRecord, SearchQuery, SubmitReceipt};
use petchain_core::{
    Fingerprint, FoundReport, LostReport, PetId, PetProfile, PetStatus, VetEntry,
};
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct PetArgs {
    /// Directory to store node data
    #[arg(short, long, default_value = "./data", global = true)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: PetCommand,
}

#[derive(Subcommand)]
enum PetCommand {
    /// Register a new pet
    Register {
        /// Owner key name
        #[arg(short, long)]
        key: String,

        /// Pet name
        #[arg(long)]
        name: String,

        #[arg(long, default_value = "dog")]
        species: String,

        #[arg(long)]
        breed: Option<String>,

        #[arg(long)]
        microchip: Option<String>,

        /// Weight, e.g. "12kg"
        #[arg(long)]
        weight: Option<String>,

        #[arg(long)]
        owner_name: String,

        #[arg(long)]
        owner_phone: String,

        #[arg(long)]
        owner_email: Option<String>,

        /// Explicit pet id (derived from microchip, owner and time if omitted)
        #[arg(long)]
        id: Option<String>,

        /// Mine a block right away
        #[arg(long)]
        mine: bool,
    },
    /// Add a veterinary record
    Vet {
        pet_id: String,

        /// Owner key name
        #[arg(short, long)]
        key: String,

        /// Record type, e.g. vaccination or checkup
        #[arg(long)]
        record_type: String,

        #[arg(long)]
        vet_name: String,

        #[arg(long)]
        procedure: String,

        #[arg(long)]
        clinic: Option<String>,

        /// Vet contact number
        #[arg(long)]
        vet_phone: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        #[arg(long)]
        mine: bool,
    },
    /// Report a pet lost
    Lost {
        pet_id: String,

        /// Owner key name
        #[arg(short, long)]
        key: String,

        /// Last known location
        #[arg(long)]
        location: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        mine: bool,
    },
    /// Report a lost pet found
    Found {
        pet_id: String,

        /// Finder key name
        #[arg(short, long)]
        key: String,

        /// How the owner can reach the finder
        #[arg(long)]
        contact: String,

        #[arg(long)]
        mine: bool,
    },
    /// Transfer ownership to another key
    Transfer {
        pet_id: String,

        /// Current owner key name
        #[arg(short, long)]
        key: String,

        /// New owner fingerprint (hex)
        #[arg(long)]
        to: String,

        #[arg(long)]
        mine: bool,
    },
    /// Show a pet's record
    Show { pet_id: String },
    /// Search pets by name, breed, microchip or id
    Search {
        #[arg(default_value = "")]
        query: String,

        /// Only list lost pets
        #[arg(long)]
        lost_only: bool,
    },
    /// Show a pet's event history
    History {
        pet_id: String,

        /// Include unconfirmed events
        #[arg(long)]
        pending: bool,
    },
}

pub fn run(args: PetArgs) -> Result<()> {
    let data_dir = args.data_dir;
    let node = open_node(&data_dir)?;

    match args.command {
        PetCommand::Register {
            key,
            name,
            species,
            breed,
            microchip,
            weight,
            owner_name,
            owner_phone,
            owner_email,
            id,
            mine,
        } => {
            let owner = load_keypair(&data_dir, &key)?;
            let mut profile = PetProfile::new(name, owner_name, owner_phone).with_species(species);
            if let Some(breed) = breed {
                profile = profile.with_breed(breed);
            }
            if let Some(microchip) = microchip {
                profile = profile.with_microchip(microchip);
            }
            if let Some(weight) = weight {
                profile = profile.with_weight(weight);
            }
            if let Some(email) = owner_email {
                profile = profile.with_email(email);
            }

            let (pet_id, receipt) = node.register_pet(id.map(PetId::new), profile, &owner)?;
            println!("  Pet ID: {}", pet_id.to_string().bright_yellow());
            finish(&node, &data_dir, &receipt, mine)
        }
        PetCommand::Vet {
            pet_id,
            key,
            record_type,
            vet_name,
            procedure,
            clinic,
            vet_phone,
            notes,
            mine,
        } => {
            let owner = load_keypair(&data_dir, &key)?;
            let mut entry = VetEntry::new(record_type, vet_name, procedure);
            entry.vet_clinic = clinic;
            entry.vet_phone = vet_phone;
            entry.notes = notes;
            let receipt = node.add_vet_record(PetId::new(pet_id), &owner, entry)?;
            finish(&node, &data_dir, &receipt, mine)
        }
        PetCommand::Lost {
            pet_id,
            key,
            location,
            description,
            mine,
        } => {
            let owner = load_keypair(&data_dir, &key)?;
            let report = LostReport {
                location,
                description,
            };
            let receipt = node.report_lost(PetId::new(pet_id), &owner, report)?;
            finish(&node, &data_dir, &receipt, mine)
        }
        PetCommand::Found {
            pet_id,
            key,
            contact,
            mine,
        } => {
            let finder = load_keypair(&data_dir, &key)?;
            let pet_id = PetId::new(pet_id);
            let owner = node.get_pet(&pet_id)?.owner;
            let report = FoundReport {
                finder_contact: contact,
            };
            let receipt = node.report_found(pet_id, owner, &finder, report)?;
            finish(&node, &data_dir, &receipt, mine)
        }
        PetCommand::Transfer {
            pet_id,
            key,
            to,
            mine,
        } => {
            let owner = load_keypair(&data_dir, &key)?;
            let new_owner = Fingerprint::from_hex(&to)
                .with_context(|| format!("Invalid fingerprint: {}", to))?;
            let receipt = node.transfer(PetId::new(pet_id), &owner, new_owner)?;
            finish(&node, &data_dir, &receipt, mine)
        }
        PetCommand::Show { pet_id } => {
            let record = node.get_pet(&PetId::new(pet_id))?;
            print_record(&record);
            Ok(())
        }
        PetCommand::Search { query, lost_only } => {
            let query = SearchQuery::new(&query).lost_only(lost_only);
            let results = node.search_pets(&query)?;

            println!();
            if results.is_empty() {
                println!("  {}", "No pets found.".yellow());
            }
            for record in &results {
                println!(
                    "  {}  {:<20} {:<12} {}",
                    record.pet_id.to_string().bright_yellow(),
                    record.profile.name,
                    record.profile.species,
                    status_label(record.status)
                );
            }
            println!();
            Ok(())
        }
        PetCommand::History { pet_id, pending } => {
            let history = node.get_history(&PetId::new(pet_id), pending)?;

            println!();
            for entry in &history {
                let block = match entry.block_index {
                    Some(index) => format!("block {}", index).bright_cyan(),
                    None => "pending".yellow(),
                };
                println!(
                    "  {}  {:<14} {}",
                    format_timestamp(entry.transaction.timestamp).bright_black(),
                    entry.transaction.kind().to_string(),
                    block
                );
            }
            println!();
            Ok(())
        }
    }
}

/// Persist the pending pool, mining it first when asked.
fn finish(node: &NodeState, data_dir: &Path, receipt: &SubmitReceipt, mine: bool) -> Result<()> {
    print_receipt(receipt);
    if mine {
        let block = node.mine()?;
        println!(
            "{}  Mined block {}: {}",
            "✓".green().bold(),
            block.index.to_string().bright_cyan(),
            block.hash.to_hex().bright_yellow()
        );
    }
    save_pending(node, data_dir)
}

fn status_label(status: PetStatus) -> ColoredString {
    match status {
        PetStatus::Active => "active".green(),
        PetStatus::Lost => "lost".red().bold(),
        PetStatus::Found => "found".cyan(),
    }
}

fn print_record(record: &PetRecord) {
    let profile = &record.profile;

    println!();
    println!("{}", "Pet Record:".bold().cyan());
    println!();
    println!("  Pet ID:      {}", record.pet_id.to_string().bright_yellow());
    println!("  Name:        {}", profile.name);
    println!("  Species:     {}", profile.species);
    if let Some(breed) = &profile.breed {
        println!("  Breed:       {}", breed);
    }
    if let Some(microchip) = &profile.microchip_id {
        println!("  Microchip:   {}", microchip);
    }
    if let Some(weight) = &profile.weight {
        println!("  Weight:      {}", weight);
    }
    println!("  Status:      {}", status_label(record.status));
    println!("  Owner:       {} ({})", profile.owner_name, profile.owner_phone);
    println!("  Owner Key:   {}", record.owner.to_hex().bright_black());
    println!("  Registered:  {}", format_timestamp(record.registered_at));
    println!("  Last Block:  {}", record.last_event_block.to_string().bright_cyan());

    if let Some(lost) = &record.lost {
        println!();
        println!("  {} since {}", "Lost".red().bold(), format_timestamp(lost.since));
        if let Some(location) = &lost.report.location {
            println!("    Location:    {}", location);
        }
        if let Some(description) = &lost.report.description {
            println!("    Description: {}", description);
        }
    }
    if let Some(found) = &record.found {
        println!();
        println!("  {} at {}", "Found".cyan().bold(), format_timestamp(found.at));
        println!("    Finder contact: {}", found.report.finder_contact);
    }

    if !record.vet_history.is_empty() {
        println!();
        println!("  {}", "Veterinary History:".bold());
        for entry in &record.vet_history {
            println!(
                "    {} - {} by {}",
                entry.record_type.bright_cyan(),
                entry.procedure,
                entry.vet_name
            );
            if let Some(phone) = &entry.vet_phone {
                println!("      Phone: {}", phone);
            }
        }
    }
    println!();
}
