use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use workspace_projects::git::GitProbe;
use workspace_projects::util::init_logging;
use workspace_projects::workspace::view::{
    git_badge, pinned_subtitle, resolve_app, resolve_terminal, AppChoice, OnboardingProgress,
    ProjectSections, TerminalChoice,
};
use workspace_projects::workspace::{
    App, Direction, FileStore, Settings, WorkspaceError, WorkspaceManager,
};

#[derive(Parser, Debug)]
#[command(
    name = "workspace-projects",
    version,
    about = "Browse projects under workspace folders"
)]
struct Cli {
    /// Directory holding config.toml and the stored records
    #[arg(long, env = "WORKSPACE_PROJECTS_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List projects grouped by workspace, pinned first
    List {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long)]
        json: bool,
    },
    /// Show registered workspaces in order
    Workspaces,
    /// Register a workspace folder
    Add { path: PathBuf },
    /// Unregister a workspace folder
    Remove { path: String },
    /// Move the workspace at INDEX up or down
    Move { index: usize, direction: MoveDirection },
    /// Pin or unpin a project by full path
    Pin { path: String },
    /// Set the default app, or a workspace override with --workspace
    SetApp {
        name: String,
        bundle_id: String,
        #[arg(long)]
        workspace: Option<String>,
    },
    /// Drop a workspace's app override
    ResetApp { workspace: String },
    /// Set the terminal app; no arguments restores the system default
    SetTerminal {
        #[arg(requires = "bundle_id")]
        name: Option<String>,
        bundle_id: Option<String>,
    },
    /// Show onboarding progress, or mark it complete
    Onboarding {
        #[arg(long)]
        complete: bool,
    },
    /// Print the app a project opens with
    Open { path: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum MoveDirection {
    Up,
    Down,
}

impl From<MoveDirection> for Direction {
    fn from(d: MoveDirection) -> Self {
        match d {
            MoveDirection::Up => Direction::Up,
            MoveDirection::Down => Direction::Down,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => Settings::default_data_dir()?,
    };
    let settings = Settings::load(&data_dir)?;
    debug!(data_dir = %data_dir.display(), ?settings, "Settings loaded");

    let store = Arc::new(FileStore::new(Settings::store_dir(&data_dir)));
    let manager = WorkspaceManager::new(store, GitProbe::from_config(&settings.probe));
    let state = manager.load_all().await;

    match cli.command {
        Command::List { search, json } => {
            let projects = manager.aggregate_projects(&state.workspaces).await;
            let sections = ProjectSections::build(&projects, &state, &search);
            if json {
                println!("{}", serde_json::to_string_pretty(&sections)?);
            } else if state.workspaces.is_empty() {
                println!("No workspaces. Add one with `workspace-projects add <PATH>`.");
            } else {
                if !sections.pinned.is_empty() {
                    println!("Pinned");
                    for project in &sections.pinned {
                        print_project(
                            &project.name,
                            &pinned_subtitle(project),
                            project.git_status.as_ref().map(git_badge),
                        );
                    }
                }
                for group in &sections.groups {
                    println!("{} ({})", group.title, group.workspace);
                    for project in &group.projects {
                        print_project(
                            &project.name,
                            "",
                            project.git_status.as_ref().map(git_badge),
                        );
                    }
                }
            }
        }
        Command::Workspaces => {
            for (index, workspace) in state.workspaces.iter().enumerate() {
                match state.workspace_app(workspace) {
                    Some(app) => println!("{}  {}  [{}]", index, workspace, app.name),
                    None => println!("{}  {}", index, workspace),
                }
            }
        }
        Command::Add { path } => {
            let abs = std::fs::canonicalize(&path)
                .with_context(|| format!("Cannot resolve {}", path.display()))?;
            if !abs.is_dir() {
                bail!("{} is not a directory", abs.display());
            }
            let abs = abs.to_string_lossy().to_string();
            match manager.add_workspace(&abs).await {
                Ok(()) => println!("Workspace added: {}", abs),
                Err(WorkspaceError::AlreadyExists(p)) => bail!("Workspace already added: {}", p),
                Err(e) => return Err(e.into()),
            }
        }
        Command::Remove { path } => {
            let path = stored_workspace_path(path);
            manager.remove_workspace(&path).await?;
            println!("Workspace removed: {}", path);
        }
        Command::Move { index, direction } => {
            manager.move_workspace(index, direction.into()).await?;
            for (i, workspace) in manager.snapshot().await.workspaces.iter().enumerate() {
                println!("{}  {}", i, workspace);
            }
        }
        Command::Pin { path } => {
            if manager.toggle_pin(&path).await? {
                println!("Pinned {}", path);
            } else {
                println!("Unpinned {}", path);
            }
        }
        Command::SetApp {
            name,
            bundle_id,
            workspace,
        } => {
            let app = App::new(name, bundle_id);
            match workspace {
                Some(ws) => manager.set_workspace_app(&ws, app).await?,
                None => manager.set_default_app(app).await?,
            }
        }
        Command::ResetApp { workspace } => {
            manager.reset_workspace_app(&workspace).await?;
        }
        Command::SetTerminal { name, bundle_id } => {
            let app = name.zip(bundle_id).map(|(n, b)| App::new(n, b));
            manager.set_terminal_app(app).await?;
        }
        Command::Onboarding { complete } => {
            let progress = OnboardingProgress::from_state(&state);
            if complete {
                if !progress.is_ready() {
                    bail!("Add a workspace and choose a default app before finishing onboarding");
                }
                manager.set_onboarding_completed(true).await?;
            }
            println!(
                "workspace: {}  default app: {}  completed: {}",
                progress.has_workspace,
                progress.has_default_app,
                complete || state.onboarding_completed
            );
        }
        Command::Open { path } => {
            let projects = manager.aggregate_projects(&state.workspaces).await;
            let Some(project) = projects.iter().find(|p| p.full_path == path) else {
                bail!("No project at {}", path);
            };
            match resolve_app(&state, project) {
                AppChoice::WorkspaceOverride(app) => {
                    println!("{} ({}) [workspace]", app.name, app.bundle_id)
                }
                AppChoice::Default(app) => println!("{} ({})", app.name, app.bundle_id),
                AppChoice::Unselected => {
                    bail!("No application selected; run `workspace-projects set-app`")
                }
            }
            match resolve_terminal(&state) {
                TerminalChoice::Configured(app) => {
                    println!("terminal: {} ({})", app.name, app.bundle_id)
                }
                TerminalChoice::SystemDefault => println!("terminal: system default"),
            }
        }
    }

    Ok(())
}

/// The canonical form `add` stores; a folder already gone from disk keeps
/// its literal path.
fn stored_workspace_path(path: String) -> String {
    std::fs::canonicalize(&path)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or(path)
}

fn print_project(name: &str, subtitle: &str, badge: Option<String>) {
    let mut line = format!("  {}", name);
    if !subtitle.is_empty() {
        line.push_str(&format!("  {}", subtitle));
    }
    if let Some(badge) = badge {
        line.push_str(&format!("  [{}]", badge));
    }
    println!("{}", line);
}
