use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

pub const DROPBOX_TOKEN_VAR: &str = "DROPBOX_ACCESS_TOKEN";
pub const GDRIVE_TOKEN_VAR: &str = "GOOGLE_DRIVE_ACCESS_TOKEN";

#[derive(Parser, Debug)]
#[command(
    name = "pantheon",
    version,
    about = "Storage MCP servers (Dropbox, Google Drive) over stdio"
)]
pub struct Cli {
    /// Milliseconds in-flight calls may keep running once shutdown starts.
    #[arg(
        long,
        global = true,
        env = "PANTHEON_DRAIN_TIMEOUT_MS",
        default_value_t = 5000
    )]
    pub drain_timeout_ms: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the Dropbox tools (token from DROPBOX_ACCESS_TOKEN).
    Dropbox,

    /// Serve the Google Drive tools.
    Gdrive(GdriveArgs),

    /// Print a tool catalog as JSON and exit.
    Tools {
        #[arg(value_enum)]
        integration: Integration,
    },

    /// Print the version.
    Version,
}

/// Credential locations for Google Drive, tried in this order: service
/// account key, authorized-user token, then GOOGLE_DRIVE_ACCESS_TOKEN.
#[derive(Args, Debug)]
pub struct GdriveArgs {
    /// Service account key file.
    #[arg(
        long,
        env = "GOOGLE_DRIVE_CREDENTIALS_PATH",
        default_value = "/app/data/mcp/google-drive-credentials.json"
    )]
    pub credentials_path: PathBuf,

    /// OAuth token file for an authorized user.
    #[arg(
        long,
        env = "GOOGLE_DRIVE_TOKEN_PATH",
        default_value = "/app/data/mcp/google-drive-token.json"
    )]
    pub token_path: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Integration {
    Dropbox,
    Gdrive,
}
