//! Derived views over an aggregated project list
//!
//! Presentation layers render these; none of them touch storage.

use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

use super::state::{App, GitStatus, Project, WorkspaceState};

/// Case-insensitive match against name, full path and branch
pub fn matches_search(project: &Project, search: &str) -> bool {
    let needle = search.to_lowercase();
    project.name.to_lowercase().contains(&needle)
        || project.full_path.to_lowercase().contains(&needle)
        || project
            .git_status
            .as_ref()
            .is_some_and(|s| s.branch.to_lowercase().contains(&needle))
}

pub fn filter_projects<'a>(projects: &'a [Project], search: &str) -> Vec<&'a Project> {
    projects.iter().filter(|p| matches_search(p, search)).collect()
}

/// Projects of one workspace, in aggregation order
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceGroup<'a> {
    pub workspace: &'a str,
    pub title: String,
    pub projects: Vec<&'a Project>,
}

/// List layout: an optional pinned section followed by per-workspace groups
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSections<'a> {
    pub pinned: Vec<&'a Project>,
    pub groups: Vec<WorkspaceGroup<'a>>,
}

impl<'a> ProjectSections<'a> {
    /// Build the sections for the current search text.
    ///
    /// With empty search, pinned projects get their own section and are left
    /// out of their workspace group. While searching, the pinned section is
    /// empty and groups show every match, pinned or not. Pins whose project
    /// is no longer in `projects` never appear.
    pub fn build(projects: &'a [Project], state: &'a WorkspaceState, search: &str) -> Self {
        let searching = !search.is_empty();
        let pinned_set: HashSet<&str> = state.pinned_projects.iter().map(String::as_str).collect();

        let pinned = if searching {
            Vec::new()
        } else {
            projects
                .iter()
                .filter(|p| pinned_set.contains(p.full_path.as_str()))
                .collect()
        };

        let matching = filter_projects(projects, search);
        let groups = state
            .workspaces
            .iter()
            .map(|ws| WorkspaceGroup {
                workspace: ws.as_str(),
                title: basename(ws),
                projects: matching
                    .iter()
                    .copied()
                    .filter(|p| p.parent_workspace == *ws)
                    .filter(|p| searching || !pinned_set.contains(p.full_path.as_str()))
                    .collect(),
            })
            .filter(|g| !g.projects.is_empty())
            .collect();

        Self { pinned, groups }
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty() && self.groups.is_empty()
    }
}

/// Application used to open a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "app", rename_all = "snake_case")]
pub enum AppChoice {
    WorkspaceOverride(App),
    Default(App),
    /// Nothing configured; the user must pick an app
    Unselected,
}

impl AppChoice {
    pub fn app(&self) -> Option<&App> {
        match self {
            AppChoice::WorkspaceOverride(app) | AppChoice::Default(app) => Some(app),
            AppChoice::Unselected => None,
        }
    }
}

/// Workspace override first, then the global default
pub fn resolve_app(state: &WorkspaceState, project: &Project) -> AppChoice {
    if let Some(app) = state.workspace_app(&project.parent_workspace) {
        return AppChoice::WorkspaceOverride(app.clone());
    }
    match &state.default_app {
        Some(app) => AppChoice::Default(app.clone()),
        None => AppChoice::Unselected,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "app", rename_all = "snake_case")]
pub enum TerminalChoice {
    Configured(App),
    SystemDefault,
}

pub fn resolve_terminal(state: &WorkspaceState) -> TerminalChoice {
    match &state.terminal_app {
        Some(app) => TerminalChoice::Configured(app.clone()),
        None => TerminalChoice::SystemDefault,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeTone {
    Synced,
    Diverged,
}

/// `"1↓ 2↑ main"`, zero counts omitted
pub fn git_badge(status: &GitStatus) -> String {
    let mut parts = Vec::with_capacity(3);
    if status.pull > 0 {
        parts.push(format!("{}↓", status.pull));
    }
    if status.push > 0 {
        parts.push(format!("{}↑", status.push));
    }
    parts.push(status.branch.clone());
    parts.join(" ")
}

pub fn badge_tone(status: &GitStatus) -> BadgeTone {
    if status.pull > 0 || status.push > 0 {
        BadgeTone::Diverged
    } else {
        BadgeTone::Synced
    }
}

/// Directory shown next to a pinned project
pub fn pinned_subtitle(project: &Project) -> String {
    Path::new(&project.full_path)
        .parent()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// First-run checklist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OnboardingProgress {
    pub has_workspace: bool,
    pub has_default_app: bool,
}

impl OnboardingProgress {
    pub fn from_state(state: &WorkspaceState) -> Self {
        Self {
            has_workspace: !state.workspaces.is_empty(),
            has_default_app: state.default_app.is_some(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.has_workspace && self.has_default_app
    }
}

fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(ws: &str, name: &str, branch: Option<&str>) -> Project {
        Project {
            name: name.to_string(),
            full_path: format!("{}/{}", ws, name),
            parent_workspace: ws.to_string(),
            git_status: branch.map(|b| GitStatus {
                branch: b.to_string(),
                pull: 0,
                push: 0,
            }),
        }
    }

    fn state(workspaces: &[&str], pinned: &[&str]) -> WorkspaceState {
        WorkspaceState {
            workspaces: workspaces.iter().map(|s| s.to_string()).collect(),
            pinned_projects: pinned.iter().map(|s| s.to_string()).collect(),
            ..WorkspaceState::default()
        }
    }

    fn names(projects: &[&Project]) -> Vec<String> {
        projects.iter().map(|p| p.name.clone()).collect()
    }

    #[test]
    fn test_search_matches_name_path_and_branch() {
        let p = project("/Work", "Api", Some("Feature/Login"));
        assert!(matches_search(&p, "api"));
        assert!(matches_search(&p, "/work/"));
        assert!(matches_search(&p, "login"));
        assert!(!matches_search(&p, "billing"));
        assert!(!matches_search(&project("/w", "x", None), "main"));
    }

    #[test]
    fn test_pinned_projects_are_segregated_without_search() {
        let projects = vec![project("/w", "a", None), project("/w", "b", None)];
        let state = state(&["/w"], &["/w/b"]);

        let sections = ProjectSections::build(&projects, &state, "");

        assert_eq!(names(&sections.pinned), vec!["b"]);
        assert_eq!(sections.groups.len(), 1);
        assert_eq!(sections.groups[0].title, "w");
        assert_eq!(names(&sections.groups[0].projects), vec!["a"]);
    }

    #[test]
    fn test_search_hides_pinned_section() {
        let projects = vec![project("/w", "app", None), project("/w", "apple", None)];
        let state = state(&["/w"], &["/w/apple"]);

        let sections = ProjectSections::build(&projects, &state, "app");

        assert!(sections.pinned.is_empty());
        assert_eq!(names(&sections.groups[0].projects), vec!["app", "apple"]);
    }

    #[test]
    fn test_stale_pins_and_empty_groups_are_dropped() {
        let projects = vec![project("/b", "x", None)];
        let state = state(&["/a", "/b"], &["/removed/y"]);

        let sections = ProjectSections::build(&projects, &state, "");

        assert!(sections.pinned.is_empty());
        assert_eq!(sections.groups.len(), 1);
        assert_eq!(sections.groups[0].workspace, "/b");
    }

    #[test]
    fn test_resolve_app_precedence() {
        let p = project("/w", "a", None);
        let mut state = state(&["/w"], &[]);
        assert_eq!(resolve_app(&state, &p), AppChoice::Unselected);

        let editor = App::new("Zed", "dev.zed.Zed");
        state.default_app = Some(editor.clone());
        assert_eq!(resolve_app(&state, &p), AppChoice::Default(editor));

        let ide = App::new("IntelliJ IDEA", "com.jetbrains.intellij");
        state.workspace_apps.insert("/w".to_string(), ide.clone());
        assert_eq!(resolve_app(&state, &p), AppChoice::WorkspaceOverride(ide));
    }

    #[test]
    fn test_resolve_terminal_falls_back_to_system() {
        let mut state = WorkspaceState::default();
        assert_eq!(resolve_terminal(&state), TerminalChoice::SystemDefault);
        let term = App::new("Warp", "dev.warp.Warp-Stable");
        state.terminal_app = Some(term.clone());
        assert_eq!(resolve_terminal(&state), TerminalChoice::Configured(term));
    }

    #[test]
    fn test_git_badge() {
        let mut status = GitStatus {
            branch: "main".to_string(),
            pull: 0,
            push: 0,
        };
        assert_eq!(git_badge(&status), "main");
        assert_eq!(badge_tone(&status), BadgeTone::Synced);

        status.pull = 1;
        status.push = 2;
        assert_eq!(git_badge(&status), "1↓ 2↑ main");
        assert_eq!(badge_tone(&status), BadgeTone::Diverged);
    }

    #[test]
    fn test_onboarding_progress() {
        let mut state = state(&[], &[]);
        assert!(!OnboardingProgress::from_state(&state).is_ready());

        state.workspaces.push("/w".to_string());
        assert!(!OnboardingProgress::from_state(&state).is_ready());

        state.default_app = Some(App::new("Zed", "dev.zed.Zed"));
        assert!(OnboardingProgress::from_state(&state).is_ready());
    }

    #[test]
    fn test_pinned_subtitle_is_parent_dir() {
        assert_eq!(pinned_subtitle(&project("/home/me/code", "x", None)), "/home/me/code");
    }
}
