//! `krb-mapping`: administer Kerberos principal mappings.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::mapping::{admin, MemoryStore};
use crate::Error;

/// Manage the mapping of Kerberos principals to local accounts.
#[derive(Parser, Debug)]
#[command(name = "krb-mapping", version)]
pub struct Cli {
    /// Path to the mapping store. Default: "krb-mappings.json"
    #[arg(short, long, default_value = "krb-mappings.json")]
    pub store: PathBuf,
    /// Exit with a non-zero status when a command reports an error.
    #[arg(long)]
    pub strict: bool,
    /// Subcommand.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Manage Kerberos mappings.
    Mapping {
        #[command(subcommand)]
        command: MappingCommand,
    },

    /// Manage local accounts.
    Account {
        #[command(subcommand)]
        command: AccountCommand,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum MappingCommand {
    /// Add kerberos mapping.
    Add {
        /// Email of the local account.
        email: String,
        /// Kerberos principal, e.g. user@EXAMPLE.COM.
        kerberos_id: String,
    },

    /// Remove a Kerberos mapping.
    Remove {
        email: String,
        kerberos_id: String,
    },

    /// List all Kerberos mappings or specific user mapping.
    Get {
        /// Filter by email.
        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum AccountCommand {
    /// Register a local account.
    Add {
        email: String,
        /// Create the account disabled.
        #[arg(long)]
        inactive: bool,
    },
}

/// Run `cli`, writing user-facing output to `out`.
///
/// Returns `Ok(false)` when the command reported an error and `--strict`
/// was given. Without `--strict` reported errors still exit successfully.
pub fn run<W: Write>(cli: &Cli, out: &mut W) -> io::Result<bool> {
    let ok = match MemoryStore::open(&cli.store) {
        Ok(store) => execute(&store, &cli.command, out)?,
        Err(err) => {
            log::warn!("cannot open {}: {err}", cli.store.display());
            writeln!(out, "Error: {err}")?;
            false
        }
    };
    Ok(ok || !cli.strict)
}

fn execute<W: Write>(
    store: &MemoryStore,
    command: &Commands,
    out: &mut W,
) -> io::Result<bool> {
    match command {
        Commands::Mapping { command } => match command {
            MappingCommand::Add { email, kerberos_id } => {
                match admin::add_mapping(store, email, kerberos_id) {
                    Ok(_) => {
                        writeln!(out, "Mapping added: {email} -> {kerberos_id}")?;
                        Ok(true)
                    }
                    Err(err) => report(out, email, kerberos_id, &err),
                }
            }
            MappingCommand::Remove { email, kerberos_id } => {
                match admin::remove_mapping(store, email, kerberos_id) {
                    Ok(()) => {
                        writeln!(out, "Mapping removed: {email} -> {kerberos_id}")?;
                        Ok(true)
                    }
                    Err(err) => report(out, email, kerberos_id, &err),
                }
            }
            MappingCommand::Get { email } => {
                let pairs = match admin::list_mappings(store, email.as_deref()) {
                    Ok(pairs) => pairs,
                    Err(err) => {
                        writeln!(out, "Error: {err}")?;
                        return Ok(false);
                    }
                };
                if pairs.is_empty() {
                    writeln!(out, "No mappings found.")?;
                } else {
                    writeln!(out, "Output format: email -> kerberos id")?;
                    for (email, kerberos_id) in pairs {
                        writeln!(out, "{email} -> {kerberos_id}")?;
                    }
                }
                Ok(true)
            }
        },
        Commands::Account {
            command: AccountCommand::Add { email, inactive },
        } => match store.add_account(email, !inactive) {
            Ok(account) => {
                writeln!(out, "Account added: {} (id {})", account.email, account.id)?;
                Ok(true)
            }
            Err(err) => {
                writeln!(out, "Error: {err}")?;
                Ok(false)
            }
        },
    }
}

fn report<W: Write>(
    out: &mut W,
    email: &str,
    kerberos_id: &str,
    err: &Error,
) -> io::Result<bool> {
    if err.is_account_not_found() {
        writeln!(out, "Error: User with email {email} not found.")?;
    } else if err.is_duplicate_mapping() {
        writeln!(out, "Error: Mapping to kerberos {kerberos_id} already exists.")?;
    } else if err.is_already_linked() {
        writeln!(out, "Error: Already linked.")?;
    } else {
        writeln!(out, "Error: {err}")?;
    }
    Ok(false)
}
