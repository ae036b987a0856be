use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use obsidian_memory::audit::{set_audit_frequency, AuditCadence};
use obsidian_memory::bootstrap::{AnchorStatus, Bootstrapper};
use obsidian_memory::doctor::run_doctor;
use obsidian_memory::notify::{self, NotifyOutcome, PayloadSource, SourceHints};
use obsidian_memory::pipeline::record_run;
use obsidian_memory::record::{parse_tags, RunRecord};
use obsidian_memory::store::normalize_workspace;
use obsidian_memory::{Config, MappingStore, NoteTool, ObsidianCli, ProjectIdentity};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

#[derive(Parser, Debug)]
#[command(name = "obsidian-memory")]
#[command(version)]
#[command(about = "Per-project Obsidian memory for coding agents")]
struct Cli {
    /// Workspace the command applies to (defaults to the current directory)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Save the vault path for a workspace
    SetVault {
        /// Absolute path to the vault
        #[arg(long)]
        vault_path: PathBuf,
    },
    /// Show the vault resolved for the workspace
    ShowVault {
        /// List every saved mapping instead
        #[arg(long)]
        all: bool,
    },
    /// Create the project's anchor notes
    Bootstrap {
        /// Project display name (defaults to the workspace directory name)
        #[arg(long)]
        project: Option<String>,
        /// Print mutating commands only
        #[arg(long)]
        dry_run: bool,
    },
    /// Save the vault for the workspace and bootstrap the project in one step
    InitProject {
        #[arg(long)]
        vault_path: PathBuf,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Create a run note and append it to the indexes
    RecordRun {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        title: String,
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long)]
        actions: Option<String>,
        #[arg(long)]
        decisions: Option<String>,
        #[arg(long)]
        questions: Option<String>,
        /// Comma-separated tags
        #[arg(long, default_value = "")]
        tags: String,
        #[arg(long)]
        dry_run: bool,
    },
    /// Search the project's notes
    Search {
        #[arg(long)]
        query: String,
        #[arg(long)]
        project: Option<String>,
    },
    /// Print one note by its vault-relative path
    ReadNote {
        #[arg(long)]
        path: String,
    },
    /// Audit the vault's link graph now
    Audit {
        #[arg(long)]
        project: Option<String>,
    },
    /// Check config, state, mapping and the note tool
    Doctor,
    /// Audit automatically every N recorded runs (0 disables)
    SetAuditFrequency {
        #[arg(long)]
        runs: u32,
    },
    /// Record a run from an agent hook payload (always exits 0)
    Notify {
        /// Payload shape; detected from the payload when omitted
        #[arg(long)]
        source: Option<PayloadSource>,
        /// Project name override
        #[arg(long)]
        project: Option<String>,
        /// JSON payload (read from stdin when omitted)
        payload: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries command output only
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "info")
    ).init();

    let cli = Cli::parse();

    if let Command::Notify { source, project, payload } = cli.command {
        run_notify(source, project, payload, cli.workspace).await;
        return Ok(());
    }

    let config = Config::load()?;
    let workspace = match &cli.workspace {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };

    match cli.command {
        Command::SetVault { vault_path } => {
            let mut store = MappingStore::open(config.state_file())?;
            set_vault(&mut store, &workspace, &vault_path)?;
        }
        Command::ShowVault { all } => {
            let store = MappingStore::open(config.state_file())?;
            if all {
                let mappings = store.list();
                if mappings.is_empty() {
                    log::info!("No saved vaults");
                }
                for mapping in mappings {
                    println!(
                        "{} -> {}",
                        mapping.workspace_path.display(),
                        mapping.knowledge_base_root.display()
                    );
                }
            } else {
                println!("{}", resolve_vault(&store, &workspace)?.display());
            }
        }
        Command::Bootstrap { project, dry_run } => {
            let mut store = MappingStore::open(config.state_file())?;
            let vault = resolve_vault(&store, &workspace)?;
            let tool = note_tool(&config, &vault)?.with_dry_run(dry_run);
            let project = project_identity(project, &workspace, &mut store)?;
            bootstrap(&config, &tool, &vault, &project).await?;
        }
        Command::InitProject { vault_path, project, dry_run } => {
            let mut store = MappingStore::open(config.state_file())?;
            let vault = set_vault(&mut store, &workspace, &vault_path)?;
            let tool = note_tool(&config, &vault)?.with_dry_run(dry_run);
            let project = project_identity(project, &workspace, &mut store)?;
            bootstrap(&config, &tool, &vault, &project).await?;
        }
        Command::RecordRun {
            project,
            title,
            prompt,
            summary,
            actions,
            decisions,
            questions,
            tags,
            dry_run,
        } => {
            let mut store = MappingStore::open(config.state_file())?;
            let vault = resolve_vault(&store, &workspace)?;
            let tool = note_tool(&config, &vault)?.with_dry_run(dry_run);
            let project = project_identity(project, &workspace, &mut store)?;

            let mut record = RunRecord::new(project, &title);
            record.prompt = prompt;
            record.summary = summary;
            record.actions = actions;
            record.decisions = decisions;
            record.questions = questions;
            record.tags = parse_tags(&tags);

            let run = record_run(&mut store, &tool, &config.memory.project_root, &record).await?;
            for warning in &run.outcome.warnings {
                eprintln!("warning: {}", warning);
            }
            if run.audit_triggered {
                log::info!("Graph audit ran after this run");
            }
            println!("Recorded run note: {}", run.outcome.note_path);
        }
        Command::Search { query, project } => {
            let mut store = MappingStore::open(config.state_file())?;
            let vault = resolve_vault(&store, &workspace)?;
            let tool = note_tool(&config, &vault)?;
            let project = project_identity(project, &workspace, &mut store)?;
            let scoped = format!(
                "{} path:\"{}/{}\"",
                query,
                config.memory.project_root.trim_end_matches('/'),
                project.slug
            );
            println!("{}", tool.search(&scoped).await?);
        }
        Command::ReadNote { path } => {
            let store = MappingStore::open(config.state_file())?;
            let vault = resolve_vault(&store, &workspace)?;
            let tool = note_tool(&config, &vault)?;
            print!("{}", tool.read(&path).await?);
        }
        Command::Audit { project } => {
            let mut store = MappingStore::open(config.state_file())?;
            let vault = resolve_vault(&store, &workspace)?;
            let tool = note_tool(&config, &vault)?;
            let project = project_identity(project, &workspace, &mut store)?;
            let report = AuditCadence::new(&mut store, &tool, &config.memory.project_root)
                .audit_now(&project)
                .await?;
            print!("{}", report);
        }
        Command::Doctor => {
            let report = run_doctor(&config, &workspace).await;
            print!("{}", report);
            if !report.passed() {
                anyhow::bail!("doctor found problems");
            }
        }
        Command::SetAuditFrequency { runs } => {
            let mut store = MappingStore::open(config.state_file())?;
            set_audit_frequency(&mut store, runs)?;
            println!("Audit frequency: {}", runs);
        }
        Command::Notify { .. } => unreachable!("notify is handled before config loading"),
    }

    Ok(())
}

/// Hook entry point. Every outcome, including a broken config, is logged and swallowed.
async fn run_notify(
    source: Option<PayloadSource>,
    project: Option<String>,
    payload: Option<String>,
    workspace: Option<PathBuf>,
) {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Config unavailable, using defaults: {:#}", e);
            Config::default()
        }
    };

    let raw = match payload {
        Some(raw) => raw,
        None => {
            let mut raw = String::new();
            if let Err(e) = tokio::io::stdin().read_to_string(&mut raw).await {
                log::warn!("notify: could not read stdin: {}", e);
                return;
            }
            raw
        }
    };

    let hints = SourceHints {
        source,
        workspace,
        project,
    };
    let outcome = notify::handle(&raw, &hints, &config).await;
    match &outcome {
        NotifyOutcome::Recorded { .. } | NotifyOutcome::Skipped(_) => log::info!("{}", outcome),
        NotifyOutcome::Warned(_) => log::warn!("{}", outcome),
    }
}

fn set_vault(store: &mut MappingStore, workspace: &Path, vault_path: &Path) -> Result<PathBuf> {
    let vault = normalize_workspace(vault_path)?;
    if !vault.is_dir() {
        anyhow::bail!("Vault path does not exist or is not a directory: {}", vault.display());
    }
    let mapping = store.set(workspace, &vault)?;
    println!(
        "Saved vault: {} for workspace: {}",
        mapping.knowledge_base_root.display(),
        mapping.workspace_path.display()
    );
    Ok(vault)
}

fn resolve_vault(store: &MappingStore, workspace: &Path) -> Result<PathBuf> {
    let vault = store.require(workspace)?;
    if !vault.is_dir() {
        anyhow::bail!("Saved vault no longer exists: {}", vault.display());
    }
    Ok(vault)
}

fn note_tool(config: &Config, vault: &Path) -> Result<ObsidianCli> {
    Ok(ObsidianCli::new(&config.tool.binary, vault, config.tool_timeout())?)
}

/// Explicit project name, or the workspace directory name.
fn project_identity(
    name: Option<String>,
    workspace: &Path,
    store: &mut MappingStore,
) -> Result<ProjectIdentity> {
    let name = match name.filter(|n| !n.trim().is_empty()) {
        Some(name) => name,
        None => normalize_workspace(workspace)?
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Project".to_string()),
    };
    Ok(ProjectIdentity::claim(&name, store)?)
}

async fn bootstrap(
    config: &Config,
    tool: &ObsidianCli,
    vault: &Path,
    project: &ProjectIdentity,
) -> Result<()> {
    println!("Bootstrapping project memory in vault: {}", vault.display());
    let set = Bootstrapper::new(tool, &config.memory.project_root)
        .bootstrap(project)
        .await?;
    for entry in &set.entries {
        let status = match entry.status {
            AnchorStatus::Created => "created".to_string(),
            AnchorStatus::LinksAppended(n) => format!("appended {} link(s)", n),
            AnchorStatus::Unchanged => "unchanged".to_string(),
        };
        println!("- {}: {}", entry.path, status);
    }
    Ok(())
}
