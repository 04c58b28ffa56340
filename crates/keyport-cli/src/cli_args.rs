use std::path::PathBuf;

use clap::Parser;
use keyport_vault::ImportFormat;

/// Convert an exported password vault and summarize what was imported.
#[derive(Parser, Debug, Clone)]
#[command(name = "keyport", author, version, about)]
pub struct Args {
    /// Export file, or OPVault directory, to read.
    pub path: PathBuf,

    /// Source format: `opvault`, `1pux`, `bitwarden` or `protonpass`.
    /// Guessed from the path when omitted.
    #[arg(long, short)]
    pub format: Option<ImportFormat>,

    /// Read the vault password from this environment variable.
    #[arg(long, value_name = "VAR", conflicts_with = "password_stdin")]
    pub password_env: Option<String>,

    /// Read the vault password from the first line of standard input.
    #[arg(long)]
    pub password_stdin: bool,

    /// JSON file with import options. Missing keys take their defaults.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Append logs to this file instead of standard error.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Print a JSON summary instead of the group tree.
    #[arg(long)]
    pub json: bool,
}
