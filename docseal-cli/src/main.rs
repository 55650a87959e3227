//! `docseal`: write, read and inspect encrypted documents from the shell.
//!
//! Master keys are kept by a file-backed development key store under
//! `<root>/keystore`. Set `RUST_LOG=docseal_core=debug` to trace keyset
//! provisioning.

mod commands;
mod keystore;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Transparent at-rest encryption for documents.
#[derive(Parser, Debug)]
#[command(name = "docseal", version, about, long_about = None)]
pub struct Cli {
    /// Storage root. Defaults to the platform data directory.
    #[arg(long, env = "DOCSEAL_ROOT", global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Subcommands of `docseal`.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encrypt and store a text document, provisioning keys on first use.
    Write {
        /// The document to write.
        #[command(flatten)]
        document: DocumentArgs,

        /// The text to store.
        value: String,
    },

    /// Decrypt and print a text document.
    Read {
        /// The document to read.
        #[command(flatten)]
        document: DocumentArgs,
    },

    /// Show the keyset status of a document without modifying anything.
    Status {
        /// The document to inspect.
        #[command(flatten)]
        document: DocumentArgs,
    },

    /// Delete a document and its keyset. The master key is kept.
    Wipe {
        /// Document name.
        name: String,
    },

    /// Delete a master key. Every keyset it wraps becomes unrecoverable.
    ForgetMasterKey {
        /// Alias of the master key.
        alias: String,
    },
}

/// Selects a document and the master key wrapping its keyset.
#[derive(Args, Debug)]
pub struct DocumentArgs {
    /// Document name.
    name: String,

    /// Master key alias. Defaults to `<name>_master_key`.
    #[arg(long = "alias", env = "DOCSEAL_MASTER_KEY_ALIAS")]
    alias: Option<String>,
}

impl DocumentArgs {
    fn master_key_alias(&self) -> String {
        self.alias
            .clone()
            .unwrap_or_else(|| format!("{}_master_key", self.name))
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    commands::run(Cli::parse()).await
}
