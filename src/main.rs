use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;
use url::Url;

use staffdesk::config::AppConfig;
use staffdesk::fields::{MasterCollection, FIELDS};
use staffdesk::gateway::{AttachmentUpload, HttpGateway, PersistenceGateway};
use staffdesk::services::edit_session::{CommitOutcome, EditEvent, EditSession};
use staffdesk::services::hierarchy::{Level as OrgLevel, ManagerHierarchyResolver};
use staffdesk::services::reference_data::{LoadState, ReferenceDataStore};

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    /// Path to the YAML configuration file
    #[clap(short, long, global = true, default_value = "staffdesk.yaml")]
    config: PathBuf,
    /// Override the backend base URL from the config file
    #[clap(long, global = true)]
    api_url: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a record with reference codes resolved to labels
    Show {
        #[clap(short, long)]
        id: String,
    },
    /// Edit one field of a record and persist it
    Set {
        #[clap(short, long)]
        id: String,
        field: String,
        value: String,
    },
    /// Upload a file into an attachment field
    Attach {
        #[clap(short, long)]
        id: String,
        field: String,
        path: PathBuf,
    },
    /// Clear an attachment field
    Detach {
        #[clap(short, long)]
        id: String,
        field: String,
    },
    /// List eligible reporting managers for a level
    Managers { level: String },
    /// Dump a reference collection
    Masters { collection: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    let config = load_config(&args)?;
    let base_url = Url::parse(&config.api_base_url)
        .with_context(|| format!("invalid api_base_url '{}'", config.api_base_url))?;
    let gateway = Arc::new(HttpGateway::new(
        base_url,
        Duration::from_secs(config.request_timeout_secs),
    )?);
    let reference_data = Arc::new(ReferenceDataStore::new(gateway.clone()));

    match args.command {
        Commands::Show { id } => {
            let mut session = open_session(&id, &gateway, &reference_data, &config).await?;
            session.preload().await;

            for desc in FIELDS.values() {
                let display = session.resolve_display(desc.name)?;
                println!("{:<26} {}", desc.label, display);
            }
        }
        Commands::Set { id, field, value } => {
            let mut session = open_session(&id, &gateway, &reference_data, &config).await?;
            session.preload().await;

            session.activate(&field)?;
            session.update_draft(Value::String(value))?;
            match session.commit_and_flush().await? {
                CommitOutcome::Unchanged => info!("{} unchanged; nothing to save", field),
                _ => info!("{} saved", field),
            }
            report_events(&mut session);
        }
        Commands::Attach { id, field, path } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let upload = AttachmentUpload {
                file_name: path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or("upload.bin")
                    .to_string(),
                content_type: content_type_for(&path),
                bytes,
            };

            let mut session = open_session(&id, &gateway, &reference_data, &config).await?;
            session.attachment(&field)?.upload(upload)?;
            session.flush().await?;
            report_events(&mut session);
        }
        Commands::Detach { id, field } => {
            let mut session = open_session(&id, &gateway, &reference_data, &config).await?;
            session.attachment(&field)?.delete()?;
            session.flush().await?;
            report_events(&mut session);
        }
        Commands::Managers { level } => {
            let level = OrgLevel::parse(&level).ok_or_else(|| anyhow!("unknown level '{level}'"))?;
            let rows = gateway.list_records(&config.resource).await?;
            let resolver = ManagerHierarchyResolver::from_records(&rows);

            let candidates = resolver.candidates_for(level);
            if candidates.is_empty() {
                println!("no eligible reporting managers for {level}");
            }
            for candidate in candidates {
                println!("{:<8} {:<4} {}", candidate.code, candidate.level, candidate.label);
            }
        }
        Commands::Masters { collection } => {
            let collection = MasterCollection::from_endpoint(&collection)
                .ok_or_else(|| anyhow!("unknown collection '{collection}'"))?;
            reference_data.load(collection).await;

            if reference_data.state(collection) == LoadState::Failed {
                bail!("failed to load {collection} from the backend");
            }
            for entry in reference_data.entries(collection) {
                println!("{:<14} {}", entry.code, entry.label);
            }
        }
    }

    Ok(())
}

async fn open_session(
    id: &str,
    gateway: &Arc<HttpGateway>,
    reference_data: &Arc<ReferenceDataStore>,
    config: &AppConfig,
) -> Result<EditSession> {
    let session = EditSession::open(
        id,
        gateway.clone(),
        reference_data.clone(),
        &config.resource,
    )
    .await?;
    Ok(session)
}

fn report_events(session: &mut EditSession) {
    for event in session.take_events() {
        match event {
            EditEvent::FieldSaved { field, value } => println!("saved {field} = {value}"),
            EditEvent::SaveFailed { field, message } => {
                println!("save failed for {field}: {message}")
            }
            EditEvent::ManagerCleared { .. } => {
                println!("reporting manager cleared; re-select from the new candidate list")
            }
            EditEvent::AttachmentChanged { field } => {
                println!("attachment {field} changed; refresh the list view")
            }
        }
    }
}

fn load_config(args: &Cli) -> Result<AppConfig> {
    let mut config = if args.config.exists() {
        AppConfig::from_file(&args.config)?
    } else if args.api_url.is_some() {
        AppConfig::with_base_url("")
    } else {
        bail!(
            "config file {} not found; create one or pass --api-url",
            args.config.display()
        );
    };

    if let Some(url) = &args.api_url {
        config.api_base_url = url.clone();
    }
    Ok(config)
}

fn content_type_for(path: &std::path::Path) -> String {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
    .to_string()
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level.to_string()))
        .without_time()
        .init();
}
