//! `bedside`: drive a SMART-on-FHIR EHR launch and the vitals chart from a terminal.
//!
//! The launch and callback steps run as separate invocations; CSRF state
//! and credentials are kept in JSON files under the state directory.

mod output;

use anyhow::{Context, Result};
use bedside_models::vitals::VitalKind;
use bedside_models::PatientSummary;
use bedside_smart::storage::default_state_dir;
use bedside_smart::{
    CallbackState, ClientStorage, FetchState, FileStore, KeyValueStore, LaunchParams,
    ResourceQuery, SmartAppConfig, SmartClient, VitalEntry,
};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// SMART-on-FHIR clinician client
#[derive(Parser, Debug)]
#[command(name = "bedside", author, version, about, long_about = None)]
struct Cli {
    /// Directory holding state.json and session.json
    #[arg(long, env = "BEDSIDE_STATE_DIR", global = true)]
    state_dir: Option<PathBuf>,

    /// Registered client id
    #[arg(long, env = "BEDSIDE_CLIENT_ID", global = true)]
    client_id: Option<String>,

    /// Registered redirect URI
    #[arg(long, env = "BEDSIDE_REDIRECT_URI", global = true)]
    redirect_uri: Option<String>,

    /// Print raw JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start an EHR launch and print the authorization URL
    Launch {
        /// Launch URL from the EHR (containing iss and launch)
        url: Option<String>,
        /// FHIR base URL of the EHR
        #[arg(long, conflicts_with = "url")]
        iss: Option<String>,
        /// Opaque launch token
        #[arg(long, conflicts_with = "url")]
        launch: Option<String>,
    },
    /// Complete the launch with the URL the browser was redirected to
    Callback {
        /// Callback URL containing code and state
        url: String,
    },
    /// Show the launched patient
    Patient,
    /// List vital-sign Observations
    Vitals {
        /// Observation category to search
        #[arg(long, default_value = "vital-signs")]
        category: String,
        /// Only show readings with this label
        #[arg(long)]
        label: Option<String>,
    },
    /// Record one or more vitals, e.g. `add-vital heart-rate=72 blood-pressure=120/80`
    AddVital {
        /// CODE=VALUE pairs
        #[arg(required = true, value_parser = parse_entry)]
        entries: Vec<VitalEntry>,
    },
    /// List allergy intolerances
    Allergies,
    /// List the vital signs that can be recorded
    Catalogue,
    /// Forget stored credentials
    Logout,
}

fn parse_entry(raw: &str) -> std::result::Result<VitalEntry, String> {
    let (code, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected CODE=VALUE, got {raw:?}"))?;
    if VitalKind::from_code(code).is_none() {
        let known: Vec<&str> = VitalKind::ALL.iter().map(|k| k.code()).collect();
        return Err(format!(
            "unknown vital {code:?} (expected one of {})",
            known.join(", ")
        ));
    }
    Ok(VitalEntry::new(code, value))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let client = build_client(&cli)?;

    match cli.command {
        Commands::Launch { url, iss, launch } => {
            let params = match (url, iss, launch) {
                (Some(url), _, _) => LaunchParams::from_url(&url)?,
                (None, Some(iss), Some(launch)) => LaunchParams { iss, launch },
                _ => anyhow::bail!("provide a launch URL or both --iss and --launch"),
            };
            let redirect = client.launch(&params).await.context("Launch failed")?;
            println!("Open this URL in a browser to authorize:");
            println!("{}", redirect.authorize_url);
        }
        Commands::Callback { url } => {
            let mut handler = client.callback_handler();
            let outcome = handler.handle(&url).await.clone();
            match outcome {
                CallbackState::Success(success) => {
                    println!("Authorized. Stored: {}", success.persisted_keys.join(", "));
                }
                CallbackState::Failed(e) => {
                    eprintln!("{}", handler.debug_info());
                    return Err(e).context("Authorization callback failed");
                }
                other => anyhow::bail!("callback finished in state {other:?}"),
            }
        }
        Commands::Patient => {
            let patient = fetch(&client, ResourceQuery::Patient)
                .await?
                .into_iter()
                .next()
                .context("Patient not found")?;
            if cli.json {
                output::print_json(&patient)?;
            } else {
                let today = chrono::Local::now().date_naive();
                let summary = PatientSummary::from_resource(&patient, today)?;
                output::print_patient(&summary);
            }
        }
        Commands::Vitals { category, label } => {
            let observations =
                fetch(&client, ResourceQuery::ObservationsByCategory { category }).await?;
            if cli.json {
                output::print_json(&Value::Array(observations))?;
            } else {
                output::print_vitals(&observations, label.as_deref());
            }
        }
        Commands::AddVital { entries } => {
            let session = client.session().context("Not authorized; run launch first")?;
            let creator = client.observation_creator(session);
            let created = creator
                .create_vitals(&entries)
                .await
                .context("Failed to record vitals")?;
            if cli.json {
                output::print_json(&Value::Array(created))?;
            } else {
                for resource in &created {
                    println!(
                        "Created Observation/{}",
                        resource["id"].as_str().unwrap_or("?")
                    );
                }
            }
        }
        Commands::Allergies => {
            let allergies = fetch(&client, ResourceQuery::AllergyIntolerances).await?;
            if cli.json {
                output::print_json(&Value::Array(allergies))?;
            } else {
                output::print_allergies(&allergies);
            }
        }
        Commands::Catalogue => output::print_catalogue(),
        Commands::Logout => {
            client.storage().durable.clear()?;
            client.storage().session.clear()?;
            println!("Credentials removed");
        }
    }

    Ok(())
}

fn build_client(cli: &Cli) -> Result<SmartClient> {
    let state_dir = match &cli.state_dir {
        Some(dir) => dir.clone(),
        None => default_state_dir().context("No data directory; pass --state-dir")?,
    };
    tracing::debug!(state_dir = %state_dir.display(), "Using state directory");

    let durable: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(state_dir.join("state.json"))?);
    let session: Arc<dyn KeyValueStore> =
        Arc::new(FileStore::open(state_dir.join("session.json"))?);

    let mut config = SmartAppConfig::default();
    if let Some(client_id) = &cli.client_id {
        config.client_id = client_id.clone();
    }
    if let Some(redirect_uri) = &cli.redirect_uri {
        config.redirect_uri = redirect_uri.clone();
    }
    config.validate().context("Invalid client registration")?;

    Ok(SmartClient::new(config, ClientStorage::new(durable, session))?)
}

async fn fetch(client: &SmartClient, query: ResourceQuery) -> Result<Vec<Value>> {
    let session = client.session().context("Not authorized; run launch first")?;
    let resource = query.resource_type();
    match client.fetcher(session, query).fetch().await {
        FetchState::Done(resources) => Ok(resources),
        FetchState::Failed(e) => Err(e).with_context(|| format!("Failed to load {resource}")),
        other => anyhow::bail!("fetch finished in state {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bedside_smart::keys;

    #[test]
    fn test_parse_entry() {
        let entry = parse_entry("blood-pressure=120/80").unwrap();
        assert_eq!(entry.code, "blood-pressure");
        assert_eq!(entry.value, "120/80");

        assert!(parse_entry("heart-rate").is_err());
        assert!(parse_entry("blood-glucose=5.4").unwrap_err().contains("heart-rate"));
    }

    #[test]
    fn test_cli_parses_global_flags() {
        let cli = Cli::try_parse_from([
            "bedside",
            "--state-dir",
            "/tmp/bedside",
            "add-vital",
            "heart-rate=72",
            "bmi=22.5",
        ])
        .unwrap();
        assert_eq!(cli.state_dir, Some(PathBuf::from("/tmp/bedside")));
        match cli.command {
            Commands::AddVital { entries } => assert_eq!(entries.len(), 2),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_client_state_lives_in_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from([
            "bedside",
            "--state-dir",
            dir.path().to_str().unwrap(),
            "logout",
        ])
        .unwrap();
        let client = build_client(&cli).unwrap();
        client.storage().durable.set(keys::ACCESS_TOKEN, "t").unwrap();
        client.storage().session.set(keys::AUTH_STATE, "s").unwrap();
        assert!(dir.path().join("state.json").exists());
        assert!(dir.path().join("session.json").exists());

        // Patient and issuer were never stored.
        assert!(client.session().is_err());
    }
}
