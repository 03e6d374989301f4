//! Cloak command line.
//!
//! # Usage
//!
//! ```bash
//! # Root of a member set (one identifier per line)
//! cloak root --members members.txt
//!
//! # Prove and verify membership
//! cloak prove --members members.txt --id alice --out alice.cbor
//! cloak verify --proof alice.cbor
//!
//! # Nullifier for a seed, group and action
//! cloak nullifier --seed "$(cloak seed)" --group <64 hex> --action <64 hex>
//!
//! # Drive a session key manager and show its rotations
//! cloak session-demo --messages 25 --max-messages 10
//! ```

mod commands;
mod error;
mod system_env;

use std::{io::Write, path::PathBuf, process::ExitCode, time::Duration};

use clap::{Parser, Subcommand};
use cloak_core::RotationPolicy;
use error::CliError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Anonymous group membership proofs and rotating session keys
#[derive(Parser, Debug)]
#[command(name = "cloak")]
#[command(about = "Anonymous group membership proofs and rotating session keys")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a fresh nullifier seed as hex
    Seed,

    /// Print the Merkle root of a member set
    Root {
        /// Member file, one identifier per line
        #[arg(long)]
        members: PathBuf,

        /// Pad unused leaves with zero hashes instead of the last member
        #[arg(long)]
        zero_padding: bool,
    },

    /// Write a CBOR membership proof for one identifier
    Prove {
        /// Member file, one identifier per line
        #[arg(long)]
        members: PathBuf,

        /// Identifier to prove
        #[arg(long)]
        id: String,

        /// Output path for the proof
        #[arg(long)]
        out: PathBuf,

        /// Pad unused leaves with zero hashes instead of the last member
        #[arg(long)]
        zero_padding: bool,
    },

    /// Verify a CBOR membership proof
    Verify {
        /// Proof file written by `prove`
        #[arg(long)]
        proof: PathBuf,
    },

    /// Derive the nullifier for a seed, group and action
    Nullifier {
        /// Seed as 64 hex characters
        #[arg(long)]
        seed: String,

        /// Group id as 64 hex characters
        #[arg(long)]
        group: String,

        /// Action id as 64 hex characters
        #[arg(long)]
        action: String,
    },

    /// Encrypt messages in a fresh group and print its rotation history
    SessionDemo {
        /// Messages to encrypt
        #[arg(long, default_value = "10")]
        messages: usize,

        /// Rotate after this many messages per key
        #[arg(long, default_value = "1000")]
        max_messages: u64,

        /// Rotate keys older than this many seconds
        #[arg(long, default_value = "604800")]
        max_duration_secs: u64,

        /// Previous keys kept per group (unbounded if omitted)
        #[arg(long)]
        max_retained_keys: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let code = match run(args.command, &mut out).await {
        Ok(code) => code,
        Err(CliError::NotAMember { id }) => {
            writeln!(std::io::stderr(), "not a member: {id}")?;
            ExitCode::FAILURE
        },
        Err(err) => return Err(err.into()),
    };

    out.flush()?;
    Ok(code)
}

async fn run(command: Command, out: &mut impl Write) -> Result<ExitCode, CliError> {
    match command {
        Command::Seed => commands::seed(out)?,
        Command::Root { members, zero_padding } => commands::root(&members, zero_padding, out)?,
        Command::Prove { members, id, out: proof_path, zero_padding } => {
            commands::prove(&members, &id, &proof_path, zero_padding, out)?;
        },
        Command::Verify { proof } => {
            if !commands::verify(&proof, out)? {
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::Nullifier { seed, group, action } => {
            commands::nullifier(&seed, &group, &action, out)?;
        },
        Command::SessionDemo { messages, max_messages, max_duration_secs, max_retained_keys } => {
            let policy = RotationPolicy {
                max_messages,
                max_duration: Duration::from_secs(max_duration_secs),
                max_retained_keys,
                ..RotationPolicy::default()
            };
            commands::session_demo(policy, messages, out).await?;
        },
    }

    Ok(ExitCode::SUCCESS)
}
