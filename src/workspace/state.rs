//! Value types shared between the store, the manager and its callers

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reference to an installed application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub name: String,
    /// Platform bundle / launch identifier
    pub bundle_id: String,
}

impl App {
    pub fn new(name: impl Into<String>, bundle_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bundle_id: bundle_id.into(),
        }
    }
}

/// Branch and upstream divergence of a project checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitStatus {
    pub branch: String,
    /// Commits the upstream has that the local branch lacks
    pub pull: u32,
    /// Local commits not yet pushed
    pub push: u32,
}

/// An immediate subdirectory of a workspace. Identity is `full_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    pub full_path: String,
    pub parent_workspace: String,
    #[serde(default)]
    pub git_status: Option<GitStatus>,
}

/// Direction for reordering the workspace list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

/// Snapshot of every persisted record, produced by `WorkspaceManager::load_all`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceState {
    pub workspaces: Vec<String>,
    pub pinned_projects: Vec<String>,
    pub default_app: Option<App>,
    pub terminal_app: Option<App>,
    pub workspace_apps: HashMap<String, App>,
    pub onboarding_completed: bool,
}

impl WorkspaceState {
    pub fn contains_workspace(&self, path: &str) -> bool {
        self.workspaces.iter().any(|w| w == path)
    }

    pub fn is_pinned(&self, project_path: &str) -> bool {
        self.pinned_projects.iter().any(|p| p == project_path)
    }

    /// Override app configured for a workspace, if any
    pub fn workspace_app(&self, workspace: &str) -> Option<&App> {
        self.workspace_apps.get(workspace)
    }
}
