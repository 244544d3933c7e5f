//! Auth administration CLI
//!
//! Manages tokens directly against the auth store. `create` prints the
//! token on a prefixed stdout line for shell-friendly extraction:
//!
//! ```text
//! token: egm_...
//! ```

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use engram_auth::{NewToken, PostgresTokenStore, TokenStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "engram", about = "Engram auth token administration")]
struct Cli {
    /// Auth store connection string; falls back to AUTH_DATABASE_URL
    /// then DATABASE_URL
    #[arg(long, env = "AUTH_DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Issue a new token
    Create {
        #[arg(long)]
        user_id: String,
        #[arg(long, default_value = "")]
        display_name: String,
        #[arg(long, default_value = "")]
        email: String,
        /// Expiry in days from now; omit for a non-expiring token
        #[arg(long)]
        expires_in_days: Option<i64>,
        /// Capability tags, repeatable (e.g. --permission admin)
        #[arg(long = "permission")]
        permissions: Vec<String>,
    },
    /// List tokens, optionally for one user
    List {
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Disable a token
    Revoke { token: String },
    /// Re-enable a revoked token
    Enable { token: String },
    /// Delete a token permanently
    Delete { token: String },
    /// Show audit events from the last N hours
    Audit {
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
    /// Usage summary for one user
    Stats {
        #[arg(long)]
        user_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let database_url = cli
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .context("set --database-url, AUTH_DATABASE_URL, or DATABASE_URL")?;

    let store = PostgresTokenStore::connect(&database_url)
        .await
        .context("failed to connect to the auth store")?;

    match cli.command {
        Command::Create {
            user_id,
            display_name,
            email,
            expires_in_days,
            permissions,
        } => {
            let expires_at = expires_in_days.map(|days| Utc::now() + Duration::days(days));
            let issued = store
                .create_token(NewToken {
                    user_id: user_id.clone(),
                    display_name,
                    email,
                    expires_at,
                    permissions,
                })
                .await?;
            println!("token: {}", issued.token);
            eprintln!(
                "issued for {} (expires: {})",
                user_id,
                issued
                    .expires_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string())
            );
        }
        Command::List { user_id } => {
            let tokens = store.list(user_id.as_deref()).await?;
            if tokens.is_empty() {
                println!("no tokens");
            }
            for token in tokens {
                println!(
                    "{}  user={}  enabled={}  expires={}  last_used={}",
                    token.token,
                    token.user_id,
                    token.enabled,
                    token
                        .expires_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "never".to_string()),
                    token
                        .last_used_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "never".to_string()),
                );
            }
        }
        Command::Revoke { token } => {
            if !store.revoke(&token).await? {
                bail!("token not found");
            }
            println!("revoked");
        }
        Command::Enable { token } => {
            if !store.enable(&token).await? {
                bail!("token not found");
            }
            println!("enabled");
        }
        Command::Delete { token } => {
            if !store.delete(&token).await? {
                bail!("token not found");
            }
            println!("deleted");
        }
        Command::Audit { hours } => {
            let since = Utc::now() - Duration::hours(hours);
            let events = store.audit(since).await?;
            if events.is_empty() {
                println!("no audit events in the last {}h", hours);
            }
            for event in events {
                println!(
                    "{}  {}  user={}  token={}  {}",
                    event.timestamp.to_rfc3339(),
                    event.action.as_str(),
                    event.user_id,
                    event.token,
                    event.error_message.unwrap_or_default(),
                );
            }
        }
        Command::Stats { user_id } => {
            let stats = store.stats(&user_id).await?;
            println!("user:             {}", stats.user_id);
            println!("tokens:           {}", stats.total_tokens);
            println!("active tokens:    {}", stats.active_tokens);
            println!("successful auths: {}", stats.successful_auths);
            println!("failed auths:     {}", stats.failed_auths);
            println!(
                "last used:        {}",
                stats
                    .last_used_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string())
            );
        }
    }

    Ok(())
}
