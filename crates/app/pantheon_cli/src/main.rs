// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use std::io::Write;
use std::time::Duration;

use clap::Parser;
use cli::{Cli, Commands, GdriveArgs, Integration};
use pantheon_core::backend::{Backend, BackendError};
use pantheon_core::credentials::{
    AuthorizedUserFile, Credential, CredentialResolver, EnvToken, ServiceAccountFile,
};
use pantheon_core::dropbox::DropboxClient;
use pantheon_core::gdrive::GoogleDriveClient;
use pantheon_mcp::{McpServer, Transport, catalog};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod cli;
mod logging;
mod signals;

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            error!("{}", e);
            1
        }
    };
    // The stdin reader runs on a blocking thread that would otherwise keep
    // the runtime alive until the host closes the pipe.
    std::process::exit(code);
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init()?;

    let args = Cli::parse();
    let drain = Duration::from_millis(args.drain_timeout_ms);

    match args.command {
        Commands::Version => {
            println!("pantheon {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Tools { integration } => print_catalog(integration)?,
        Commands::Dropbox => {
            let resolver = CredentialResolver::single(EnvToken::new(cli::DROPBOX_TOKEN_VAR));
            let server = McpServer::<DropboxClient>::new(
                catalog::dropbox::server_info(),
                catalog::dropbox::registry()?,
            )
            .with_drain_timeout(drain);
            serve(server, &resolver, DropboxClient::new).await?;
        }
        Commands::Gdrive(gdrive) => {
            let resolver = gdrive_resolver(&gdrive);
            let server = McpServer::<GoogleDriveClient>::new(
                catalog::gdrive::server_info(),
                catalog::gdrive::registry()?,
            )
            .with_drain_timeout(drain);
            serve(server, &resolver, GoogleDriveClient::new).await?;
        }
    }

    Ok(())
}

fn gdrive_resolver(args: &GdriveArgs) -> CredentialResolver {
    CredentialResolver::new(vec![
        Box::new(ServiceAccountFile::new(args.credentials_path.clone())),
        Box::new(AuthorizedUserFile::new(args.token_path.clone())),
        Box::new(EnvToken::new(cli::GDRIVE_TOKEN_VAR)),
    ])
}

async fn serve<B, F>(server: McpServer<B>, resolver: &CredentialResolver, connect: F) -> Result<()>
where
    B: Backend,
    F: FnOnce(Credential) -> std::result::Result<B, BackendError>,
{
    info!(sources = ?resolver.kinds(), version = pantheon_core::version(), "starting MCP server");
    let shutdown = CancellationToken::new();
    signals::spawn_handler(shutdown.clone());
    server
        .run(resolver, connect, Transport::stdio(), shutdown)
        .await?;
    Ok(())
}

fn print_catalog(integration: Integration) -> Result<()> {
    let rendered = match integration {
        Integration::Dropbox => {
            serde_json::to_string_pretty(&catalog::dropbox::registry()?.list())?
        }
        Integration::Gdrive => serde_json::to_string_pretty(&catalog::gdrive::registry()?.list())?,
    };
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}")?;
    Ok(())
}
