//! The `drip` binary.
//!
//! `drip serve` reads `config.toml` (or the path given with `--config`), opens
//! the SQLite store, and serves the JSON API. The remaining subcommands
//! inspect scheduling offline.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `auth_password_hash`:
//!
//! ```text
//! drip hash-password
//! ```

mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context as _, bail};
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use drip_api::{AppState, api_router, auth::AuthConfig};
use drip_core::{
  automation::due_contacts,
  location::timezone_for_location,
  offset::{contact_hash, send_offset},
  schedule::plan,
  store::CampaignStore,
};
use drip_store_sqlite::SqliteStore;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use settings::Settings;

#[derive(Parser)]
#[command(author, version, about = "Drip campaign sequence scheduler")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the JSON API.
  Serve,
  /// Print the argon2 hash for a password entered on stdin.
  HashPassword,
  /// Print the hashed send time for a contact's step.
  Offset {
    contact_id: String,
    #[arg(long, default_value_t = 1)]
    step:       u32,
  },
  /// Resolve a free-text location to a timezone.
  Timezone { location: String },
  /// Run an automation pass over a campaign and print the result as JSON.
  Due {
    campaign_id: Uuid,
    /// Evaluate as of this instant instead of now (RFC 3339).
    #[arg(long)]
    now:         Option<DateTime<Utc>>,
  },
  /// Print a contact's freshly planned schedule as JSON without saving it.
  Schedule { contact_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  match cli.command {
    Command::HashPassword => {
      let password = read_password()?;
      let salt = SaltString::generate(&mut OsRng);
      let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
        .to_string();
      println!("{hash}");
    }
    Command::Offset { contact_id, step } => {
      let offset = send_offset(&contact_id, step);
      println!(
        "hash {} seed {} -> {:02}:{:02}",
        contact_hash(&contact_id),
        offset.seed,
        offset.hour,
        offset.minute
      );
    }
    Command::Timezone { location } => match timezone_for_location(&location) {
      Some(tz) => println!("{}", tz.name()),
      None => bail!("no timezone known for {location:?}"),
    },
    Command::Serve => serve(Settings::load(&cli.config)?).await?,
    Command::Due { campaign_id, now } => {
      let store = open_store(&Settings::load(&cli.config)?).await?;
      let pass = due_contacts(&store, campaign_id, now.unwrap_or_else(Utc::now))
        .await
        .context("automation pass failed")?;
      println!("{}", serde_json::to_string_pretty(&pass)?);
    }
    Command::Schedule { contact_id } => {
      let store = open_store(&Settings::load(&cli.config)?).await?;
      let contact = store
        .get_contact(&contact_id)
        .await?
        .with_context(|| format!("contact {contact_id} not found"))?;
      let campaign = store
        .get_campaign(contact.campaign_id)
        .await?
        .with_context(|| format!("campaign {} not found", contact.campaign_id))?;
      let steps = store.sequence_steps(contact.campaign_id).await?;
      let schedule = plan(&contact, &steps, &campaign.settings.window()?, Utc::now())?;
      println!("{}", serde_json::to_string_pretty(&schedule)?);
    }
  }

  Ok(())
}

async fn open_store(settings: &Settings) -> anyhow::Result<SqliteStore> {
  SqliteStore::open(&settings.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", settings.store_path))
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
  let (Some(username), Some(password_hash)) =
    (settings.auth_username.clone(), settings.auth_password_hash.clone())
  else {
    bail!("auth_username and auth_password_hash must be set to serve");
  };

  let store = open_store(&settings).await?;
  let state = AppState {
    store: Arc::new(store),
    auth:  Arc::new(AuthConfig { username, password_hash }),
  };

  let app = api_router(state);
  let address = settings.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}
