use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use portal_auth::auth::AuthService;
use portal_auth::config::{default_config_dir, AuthConfig};
use portal_auth::net::HttpTransport;
use portal_auth::storage::SqliteStore;
use portal_auth::telemetry;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Env var consulted before prompting for a password.
const PASSWORD_ENV: &str = "PORTAL_AUTH_PASSWORD";

#[derive(Parser, Debug)]
#[command(name = "portal-auth")]
#[command(about = "Sign in to the booking portal and inspect the local session", long_about = None)]
struct Cli {
    /// Config file (default: ~/.portal-auth/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session
    Login {
        /// Account email
        #[arg(long)]
        identifier: String,
    },
    /// End the stored session
    Logout,
    /// Show whether a usable session is stored
    Status,
    /// Renew the access token now
    Refresh,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let dir = default_config_dir()?;
    let config_path = cli.config.unwrap_or_else(|| dir.join("config.toml"));
    let config = AuthConfig::load(&config_path)?;

    let transport = HttpTransport::new(
        &config.api_base_url,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    let storage = SqliteStore::open(&dir.join("session.db"))?;
    let service = AuthService::builder(config, Arc::new(transport))
        .storage(Arc::new(storage))
        .build()?;

    match cli.command {
        Command::Login { identifier } => {
            let password = read_password()?;
            let user = service.login(&identifier, &password).await?;
            println!("Signed in as {} <{}>", user.display_name(), user.email);
        }
        Command::Logout => {
            if let Some(notify) = service.logout(true) {
                let _ = notify.await;
            }
            println!("Signed out");
        }
        Command::Status => match service.current_user() {
            Some(user) if service.is_authenticated() => {
                println!("Signed in as {} <{}> ({:?})", user.display_name(), user.email, user.role);
            }
            Some(user) => println!("Session for {} has expired", user.email),
            None => println!("Not signed in"),
        },
        Command::Refresh => {
            service.refresh_token().await?;
            println!("Token refreshed");
        }
    }
    Ok(())
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    dialoguer::Password::new()
        .with_prompt("Password")
        .interact()
        .context("Failed to read password")
}
