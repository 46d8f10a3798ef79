use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use photon_config::{SystemConfig, WorkflowDef};
use photon_runtime::{Engine, EngineConfig};
use photon_store::{SqliteStore, StatusReport, Store};
use photon_task_http::HttpTaskExecutor;
use photon_trigger::{ObjectMetadata, TriggerAdapter, TriggerConfig, UploadNotification};
use photon_workflow::Workflow;

/// Photon - a durable state machine executor
#[derive(Parser)]
#[command(name = "photon")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.photon)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Path to the system configuration file (default: <data-dir>/config.json)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Check a workflow definition without running it
  Validate {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },

  /// Run a workflow with the input document read from stdin
  Run {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },

  /// Deliver an upload notification, starting at most one execution per object key
  Notify {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,

    #[arg(long)]
    object_key: String,

    #[arg(long)]
    size: Option<u64>,

    #[arg(long)]
    content_type: Option<String>,

    #[arg(long)]
    etag: Option<String>,
  },

  /// Show the status of an execution
  Status { execution_id: String },

  /// Print the full event history of an execution
  History { execution_id: String },

  /// Resume every execution left running by a previous process
  Recover {
    /// Workflow files whose executions should be resumed
    #[arg(required = true)]
    workflow_files: Vec<PathBuf>,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".photon"),
  };

  let Some(command) = cli.command else {
    println!("photon - use --help to see available commands");
    return Ok(());
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    let system = load_system_config(cli.config.as_deref(), &data_dir).await?;
    match command {
      Commands::Validate { workflow_file } => validate(&workflow_file).await,
      Commands::Run { workflow_file } => run(&workflow_file, &system, &data_dir).await,
      Commands::Notify {
        workflow_file,
        object_key,
        size,
        content_type,
        etag,
      } => {
        let metadata = ObjectMetadata {
          size,
          timestamp: None,
          content_type,
          etag,
        };
        let notification = UploadNotification::new(object_key, metadata);
        notify(&workflow_file, notification, &system, &data_dir).await
      }
      Commands::Status { execution_id } => status(&execution_id, &system, &data_dir).await,
      Commands::History { execution_id } => history(&execution_id, &system, &data_dir).await,
      Commands::Recover { workflow_files } => {
        recover(&workflow_files, &system, &data_dir).await
      }
    }
  })
}

async fn load_system_config(path: Option<&Path>, data_dir: &Path) -> Result<SystemConfig> {
  let (path, explicit) = match path {
    Some(path) => (path.to_path_buf(), true),
    None => (data_dir.join("config.json"), false),
  };

  if !explicit && !tokio::fs::try_exists(&path).await.unwrap_or(false) {
    return Ok(SystemConfig::default());
  }

  let content = tokio::fs::read_to_string(&path)
    .await
    .with_context(|| format!("failed to read config file: {}", path.display()))?;
  SystemConfig::from_json(&content)
    .with_context(|| format!("failed to parse config file: {}", path.display()))
}

async fn load_workflow(workflow_file: &Path) -> Result<Workflow> {
  let content = tokio::fs::read_to_string(workflow_file)
    .await
    .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))?;

  let def = WorkflowDef::from_json(&content)
    .with_context(|| format!("failed to parse workflow file: {}", workflow_file.display()))?;

  Workflow::lock(def)
    .with_context(|| format!("invalid workflow definition: {}", workflow_file.display()))
}

async fn open_store(system: &SystemConfig, data_dir: &Path) -> Result<Arc<dyn Store>> {
  let url = match &system.database_url {
    Some(url) => url.clone(),
    None => {
      tokio::fs::create_dir_all(data_dir)
        .await
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;
      format!("sqlite://{}", data_dir.join("photon.db").display())
    }
  };

  let store = SqliteStore::connect(&url)
    .await
    .with_context(|| format!("failed to open execution store: {}", url))?;
  Ok(Arc::new(store))
}

/// An engine over the configured store and task endpoints, with `workflows` registered.
async fn build_engine(
  workflows: Vec<Workflow>,
  system: &SystemConfig,
  data_dir: &Path,
) -> Result<Engine> {
  let store = open_store(system, data_dir).await?;
  let tasks = HttpTaskExecutor::registry(system).context("failed to configure task endpoints")?;
  let engine = Engine::new(EngineConfig::from(system), store, tasks);

  for workflow in workflows {
    let workflow_id = workflow.workflow_id.clone();
    engine
      .register(workflow)
      .await
      .with_context(|| format!("failed to register workflow '{}'", workflow_id))?;
  }
  Ok(engine)
}

async fn validate(workflow_file: &Path) -> Result<()> {
  let workflow = load_workflow(workflow_file).await?;
  let summary = json!({
    "workflowId": workflow.workflow_id,
    "name": workflow.name,
    "startAt": workflow.root.start_at,
    "states": workflow.root.states.len(),
    "tasks": workflow.task_names(),
  });
  println!("{}", serde_json::to_string_pretty(&summary)?);
  Ok(())
}

async fn run(workflow_file: &Path, system: &SystemConfig, data_dir: &Path) -> Result<()> {
  let workflow = load_workflow(workflow_file).await?;
  let workflow_id = workflow.workflow_id.clone();
  let input = read_payload_from_stdin()?;

  let engine = build_engine(vec![workflow], system, data_dir).await?;
  let execution_id = engine
    .start(&workflow_id, input)
    .await
    .context("failed to start execution")?;
  eprintln!("Started execution: {}", execution_id);

  let report = engine
    .wait(&execution_id)
    .await
    .context("execution did not complete")?;
  print_report(&report)
}

async fn notify(
  workflow_file: &Path,
  notification: UploadNotification,
  system: &SystemConfig,
  data_dir: &Path,
) -> Result<()> {
  let workflow = load_workflow(workflow_file).await?;
  let config = TriggerConfig::new(workflow.workflow_id.clone(), system);
  let engine = build_engine(vec![workflow], system, data_dir).await?;
  let adapter = TriggerAdapter::new(engine.clone(), config);

  let execution_id = adapter
    .on_upload_notification(notification)
    .await
    .context("failed to handle upload notification")?;
  eprintln!("Execution: {}", execution_id);

  let report = engine
    .wait(&execution_id)
    .await
    .context("execution did not complete")?;
  print_report(&report)
}

async fn status(execution_id: &str, system: &SystemConfig, data_dir: &Path) -> Result<()> {
  let store = open_store(system, data_dir).await?;
  let report = store
    .status(execution_id)
    .await
    .with_context(|| format!("failed to read execution '{}'", execution_id))?;
  print_report(&report)
}

async fn history(execution_id: &str, system: &SystemConfig, data_dir: &Path) -> Result<()> {
  let store = open_store(system, data_dir).await?;
  let history = store
    .history(execution_id)
    .await
    .with_context(|| format!("failed to read execution '{}'", execution_id))?;
  println!("{}", serde_json::to_string_pretty(&history)?);
  Ok(())
}

async fn recover(workflow_files: &[PathBuf], system: &SystemConfig, data_dir: &Path) -> Result<()> {
  let mut workflows = Vec::new();
  for workflow_file in workflow_files {
    workflows.push(load_workflow(workflow_file).await?);
  }

  let engine = build_engine(workflows, system, data_dir).await?;
  let resumed = engine.recover().await.context("failed to recover executions")?;
  eprintln!("Resumed {} execution(s)", resumed.len());

  let mut reports = Vec::new();
  for execution_id in &resumed {
    let report = engine
      .wait(execution_id)
      .await
      .with_context(|| format!("execution '{}' did not complete", execution_id))?;
    reports.push(summary(&report));
  }
  println!("{}", serde_json::to_string_pretty(&reports)?);
  Ok(())
}

fn summary(report: &StatusReport) -> Value {
  json!({
    "executionId": report.execution_id,
    "workflowId": report.workflow_id,
    "status": report.status,
    "output": report.output,
    "error": report.error,
  })
}

fn print_report(report: &StatusReport) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(&summary(report))?);
  Ok(())
}

fn read_payload_from_stdin() -> Result<Value> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(json!({}));
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read input from stdin")?;

  if input.trim().is_empty() {
    Ok(json!({}))
  } else {
    serde_json::from_str(&input).context("failed to parse input JSON from stdin")
  }
}
