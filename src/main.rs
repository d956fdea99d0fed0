use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use policyflow_automation::data::HttpRequestData;
use policyflow_automation::{AutomationsConfiguration, Dependencies, TriggerData};
use policyflow_config::{AutomationsConfigurationModel, SystemEventType, ValidationOptions};
use policyflow_dispatch::{
  AutomationDispatcher, DispatchSettings, FsConfigurationProvider, HttpEntryRequest, JobWorker,
  PeriodicRegistrar, SystemEvent,
};
use policyflow_jobs::SqliteJobStore;

/// Policyflow - automation engine for insurance products
#[derive(Parser)]
#[command(name = "policyflow")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.policyflow)
  #[arg(long, global = true, env = "POLICYFLOW_DATA_DIR")]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Validate and build an automations.json file
  Validate {
    /// Path to the configuration file
    configuration_file: PathBuf,

    /// Also reject identical HTTP routes across automations
    #[arg(long)]
    cross_automation_routes: bool,
  },

  /// Run the automation handling an HTTP request
  Http {
    #[command(flatten)]
    target: Target,

    /// Product alias
    #[arg(long, env = "POLICYFLOW_PRODUCT")]
    product: String,

    /// HTTP verb
    #[arg(long, default_value = "GET")]
    method: String,

    /// Request path, including any query string
    #[arg(long)]
    path: String,

    /// Request body as JSON
    #[arg(long)]
    body: Option<String>,
  },

  /// Raise a system event and queue the automations it triggers.
  /// Context entities are read as a JSON object from stdin.
  Event {
    #[command(flatten)]
    target: Target,

    /// Product alias; the tenant fallback product is used when omitted
    #[arg(long, env = "POLICYFLOW_PRODUCT")]
    product: Option<String>,

    /// Event type, e.g. quoteCreated
    #[arg(long)]
    event_type: SystemEventType,

    /// Alias of a custom event
    #[arg(long)]
    custom_event_alias: Option<String>,

    /// Id of the quote, policy or other aggregate the event is about
    #[arg(long)]
    aggregate_id: Option<String>,
  },

  /// Register recurring jobs for every periodic trigger
  Schedule,

  /// Run queued automation jobs until the queue is empty
  Work,
}

#[derive(clap::Args)]
struct Target {
  /// Tenant alias
  #[arg(long, env = "POLICYFLOW_TENANT")]
  tenant: String,

  /// Deployment environment
  #[arg(long, env = "POLICYFLOW_ENVIRONMENT", default_value = "development")]
  environment: String,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();

  let data_dir = match cli.data_dir {
    Some(data_dir) => data_dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".policyflow"),
  };

  let Some(command) = cli.command else {
    println!("policyflow - use --help to see available commands");
    return Ok(());
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { run(command, &data_dir).await })
}

async fn validate(configuration_file: &Path, cross_automation_routes: bool) -> Result<()> {
  let content = tokio::fs::read_to_string(configuration_file)
    .await
    .with_context(|| format!("failed to read configuration file: {}", configuration_file.display()))?;
  let model = AutomationsConfigurationModel::from_json(&content)
    .with_context(|| format!("failed to parse configuration file: {}", configuration_file.display()))?;

  let options = ValidationOptions {
    cross_automation_routes,
  };
  let configuration =
    AutomationsConfiguration::build_with(&model, &Dependencies::in_memory(), options)
      .context("invalid configuration")?;

  for automation in configuration.automations() {
    eprintln!(
      "{}: {} triggers, {} actions",
      automation.alias(),
      automation.triggers().len(),
      automation.actions().len()
    );
  }
  println!("ok");
  Ok(())
}

/// The services a command needs, wired over the SQLite job store in the
/// data directory.
struct Services {
  store: Arc<SqliteJobStore>,
  dispatcher: Arc<AutomationDispatcher>,
}

async fn connect_services(data_dir: &Path) -> Result<Services> {
  tokio::fs::create_dir_all(data_dir)
    .await
    .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;
  let settings = DispatchSettings::load(data_dir)
    .await
    .context("failed to load settings")?;

  let url = format!("sqlite://{}", data_dir.join("jobs.db").display());
  let store = Arc::new(
    SqliteJobStore::connect(&url)
      .await
      .context("failed to open job store")?,
  );
  let deps = Dependencies::new(store.clone(), settings.automation_queue.clone());
  let provider = Arc::new(FsConfigurationProvider::new(
    settings.configuration_root.clone(),
    deps,
  ));
  let dispatcher = Arc::new(AutomationDispatcher::new(provider, store.clone(), settings));
  Ok(Services { store, dispatcher })
}

async fn run(command: Commands, data_dir: &Path) -> Result<()> {
  let cancel = CancellationToken::new();
  let on_interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      on_interrupt.cancel();
    }
  });

  match command {
    Commands::Validate {
      configuration_file,
      cross_automation_routes,
    } => validate(&configuration_file, cross_automation_routes).await?,

    Commands::Http {
      target,
      product,
      method,
      path,
      body,
    } => {
      let content = body
        .map(|body| serde_json::from_str::<Value>(&body))
        .transpose()
        .context("failed to parse request body")?;
      let (path, query) = match path.split_once('?') {
        Some((path, query)) => (path.to_string(), query_parameters(query)),
        None => (path, serde_json::Map::new()),
      };
      let request = HttpEntryRequest {
        tenant_alias: target.tenant,
        organisation_alias: None,
        product_alias: product,
        environment: target.environment,
        request: HttpRequestData {
          http_verb: method,
          path,
          query_parameters: query,
          content,
          ..Default::default()
        },
        context: read_context_from_stdin()?,
      };

      let services = connect_services(data_dir).await?;
      match services.dispatcher.handle_http(request, &cancel).await {
        Ok(Some(data)) => {
          let response = match &data.trigger {
            TriggerData::Http(http) => serde_json::to_value(&http.http_response)?,
            _ => Value::Null,
          };
          println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Ok(None) => println!("{}", json!({"httpStatusCode": 404})),
        Err(error) => {
          println!("{}", serde_json::to_string_pretty(&error.to_error())?);
          return Err(error).context("automation run failed");
        }
      }
    }

    Commands::Event {
      target,
      product,
      event_type,
      custom_event_alias,
      aggregate_id,
    } => {
      let mut event = SystemEvent::new(target.tenant, target.environment, event_type);
      event.product_alias = product;
      event.custom_event_alias = custom_event_alias;
      event.aggregate_id = aggregate_id;
      event.context = read_context_from_stdin()?;

      let services = connect_services(data_dir).await?;
      let job_ids = services
        .dispatcher
        .handle_event(event, &cancel)
        .await
        .context("failed to dispatch event")?;
      eprintln!("Queued {} automation jobs", job_ids.len());
      println!("{}", serde_json::to_string_pretty(&job_ids)?);
    }

    Commands::Schedule => {
      let services = connect_services(data_dir).await?;
      let registrar = PeriodicRegistrar::new(
        services.dispatcher.provider().clone(),
        services.store.clone(),
        services.store.clone(),
        services.dispatcher.settings().clone(),
      );
      match registrar
        .register_all()
        .await
        .context("failed to register periodic triggers")?
      {
        Some(registered) => eprintln!("Registered {} periodic jobs", registered),
        None => eprintln!("Another registration is in progress, skipped"),
      }
    }

    Commands::Work => {
      let services = connect_services(data_dir).await?;
      let worker = JobWorker::new(services.store.clone(), services.dispatcher.clone());
      let summary = worker
        .drain(&cancel)
        .await
        .context("failed to process jobs")?;
      eprintln!(
        "Jobs succeeded: {}, failed: {}",
        summary.succeeded, summary.failed
      );
    }
  }

  Ok(())
}

fn query_parameters(query: &str) -> serde_json::Map<String, Value> {
  query
    .split('&')
    .filter(|pair| !pair.is_empty())
    .map(|pair| match pair.split_once('=') {
      Some((key, value)) => (key.to_string(), Value::String(value.to_string())),
      None => (pair.to_string(), Value::String(String::new())),
    })
    .collect()
}

fn read_context_from_stdin() -> Result<IndexMap<String, Value>> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(IndexMap::new());
  }
  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read context from stdin")?;
  if input.trim().is_empty() {
    return Ok(IndexMap::new());
  }
  serde_json::from_str(&input).context("failed to parse context JSON from stdin")
}
