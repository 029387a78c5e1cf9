use std::path::PathBuf;

use clap::{Args, Subcommand};

#[derive(clap::Parser, Debug, Clone)]
#[command(name = "license-manager", about = "Issue, sign and store software licenses")]
pub struct Config {
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Directory holding the remembered key and database paths.
    #[arg(long, env = "RHLM_CONFIG_DIR", global = true)]
    pub config_dir: Option<PathBuf>,
    /// License database to use instead of the remembered one.
    #[arg(long, env = "RHLM_DB", global = true)]
    pub db: Option<PathBuf>,
    /// Signing key file to use instead of the remembered one.
    #[arg(long, env = "RHLM_KEY", global = true)]
    pub key: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Signing key management.
    #[command(subcommand)]
    Key(KeyCommand),
    /// Issue and manage licenses.
    #[command(subcommand)]
    License(LicenseCommand),
    /// Select the license database.
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Subcommand, Debug, Clone)]
pub enum KeyCommand {
    /// Generate a new signing key and save it.
    Generate {
        #[arg(long)]
        out: PathBuf,
    },
    /// Remember an existing signing key file.
    Load { path: PathBuf },
    /// Print the verification key of the active signing key.
    Show {
        /// Also print the secret signing key.
        #[arg(long)]
        signing: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct IssueArgs {
    #[arg(long)]
    pub customer: String,
    #[arg(long)]
    pub product: String,
    /// Expiration date (YYYY-MM-DD). Omit for a license that never expires.
    #[arg(long)]
    pub expires: Option<String>,
    /// Feature list, usually comma separated.
    #[arg(long, default_value = "")]
    pub features: String,
    /// Hardware id the license is bound to.
    #[arg(long)]
    pub hwid: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum LicenseCommand {
    /// Sign a new license and add it to the database.
    Issue(IssueArgs),
    List,
    /// List licenses with any field containing QUERY (case-insensitive).
    Search { query: String },
    Show { id: i64 },
    Delete { id: i64 },
    /// Write a license to a portable .lic file.
    Export {
        id: i64,
        /// Destination file; defaults to <hwid>.lic next to the database.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Read a .lic file and add it to the database.
    Import { path: PathBuf },
}

#[derive(Subcommand, Debug, Clone)]
pub enum DbCommand {
    /// Make PATH the active license database, creating it if needed.
    Switch { path: PathBuf },
    Show,
}
