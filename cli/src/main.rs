//! CIVICA CLI - Command Line Interface

use anyhow::Context;
use clap::{Parser, Subcommand};
use civica_cli::{key_file_json, load_keypair, replay, save_keypair, sign_payload, verify_envelope};
use civica_core::{CivicaConfig, Hashable, Timestamp};
use civica_crypto::derivation::keypair_from_phrase;
use civica_crypto::keys::KeyPair;
use std::path::{Path, PathBuf};
use tracing::{info, info_span};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "civica")]
#[command(about = "CIVICA - Auditable election tooling")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new keypair
    Keygen {
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Derive the key from a pass phrase instead of generating it
        #[arg(long)]
        phrase: Option<String>,

        /// Index of the derived key (with --phrase)
        #[arg(long, default_value = "0")]
        index: u32,
    },

    /// Sign a payload into a transaction envelope
    Sign {
        /// Key file of the signer
        #[arg(short, long)]
        key: PathBuf,

        /// Payload JSON file
        #[arg(short, long)]
        payload: PathBuf,

        /// Output file path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Nonce (random if not provided)
        #[arg(long)]
        nonce: Option<u64>,
    },

    /// Verify a transaction envelope
    Verify {
        /// Envelope JSON file
        #[arg(short, long)]
        envelope: PathBuf,
    },

    /// Replay a log of envelopes through a fresh voting state
    Replay {
        /// JSON array of envelopes
        #[arg(short, long)]
        log: PathBuf,

        /// Time at which to read the final state, in Unix seconds (default: now)
        #[arg(long)]
        at: Option<i64>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CivicaConfig::from_json(&read(path)?)?,
        None => CivicaConfig::default(),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
    let _span = info_span!("instance", name = %config.name).entered();

    match cli.command {
        Commands::Keygen { output, phrase, index } => {
            let keypair = match phrase {
                Some(phrase) => keypair_from_phrase(&phrase, index)?,
                None => KeyPair::generate(),
            };

            match output {
                Some(path) => {
                    save_keypair(&keypair, &path)?;
                    println!("Key saved to: {}", path.display());
                    println!("Public Key: {}", keypair.public_key().to_hex());
                }
                None => println!("{}", key_file_json(&keypair)?),
            }
        }

        Commands::Sign { key, payload, output, nonce } => {
            let keypair = load_keypair(&key)?;
            let tx = sign_payload(&read(&payload)?, &keypair, nonce)?;
            let json = tx.to_json()?;

            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!("Signed {} envelope {}", tx.payload().kind(), tx.hash());
                    println!("TX ID: {}", tx.hash());
                }
                None => println!("{}", json),
            }
        }

        Commands::Verify { envelope } => {
            match verify_envelope(&read(&envelope)?) {
                Ok(verified) => {
                    println!("✅ Valid {} envelope", verified.payload().kind());
                    println!("TX ID:  {}", verified.id());
                    println!("Signer: {}", verified.signer().to_hex());
                }
                Err(e) => {
                    eprintln!("❌ {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Replay { log, at } => {
            let at = at.map(Timestamp::from_secs).unwrap_or_else(Timestamp::now);
            let report = replay(&read(&log)?, config.voting.clone(), at)?;

            for outcome in &report.outcomes {
                let kind = outcome.kind.unwrap_or("?");
                match &outcome.result {
                    Ok(summary) => println!("[{:>4}] ✅ {:<22} {}", outcome.index, kind, summary),
                    Err(e) => println!("[{:>4}] ❌ {:<22} {}", outcome.index, kind, e),
                }
            }

            println!();
            println!("Applied {} of {} envelopes", report.applied(), report.outcomes.len());
            println!(
                "Voters: {}  Elections: {}  Candidates: {}  Votes: {}",
                report.stats.voters,
                report.stats.elections,
                report.stats.candidates,
                report.stats.votes
            );

            for entry in &report.elections {
                let election = &entry.election;
                println!();
                println!("Election {} \"{}\" [{}]", election.id, election.title, election.status);
                match &entry.results {
                    Some(results) => {
                        for (candidate_id, votes) in results {
                            println!("  {:<20} {}", candidate_id, votes);
                        }
                    }
                    None => println!("  results available after {}", election.end_time),
                }
            }

            println!();
            match &report.audit {
                Ok(()) => println!("Audit: ok"),
                Err(e) => {
                    eprintln!("Audit failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}
