//! Project discovery - immediate subdirectories of a workspace

use std::cmp::Ordering;
use std::path::Path;
use tracing::debug;

use super::state::Project;

/// List the projects of a workspace.
///
/// Only direct child directories are returned, hidden entries (leading `.`)
/// are skipped, and results are ordered by name. Symlinks are not followed.
/// An unreadable workspace yields an empty list.
pub async fn list_projects(workspace: &str) -> Vec<Project> {
    let mut entries = match tokio::fs::read_dir(workspace).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(workspace, error = %e, "Workspace not readable, no projects");
            return Vec::new();
        }
    };

    let mut projects = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                debug!(workspace, error = %e, "Workspace listing interrupted");
                return Vec::new();
            }
        };

        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }

        // DirEntry::file_type does not traverse symlinks
        match entry.file_type().await {
            Ok(ft) if ft.is_dir() => {}
            _ => continue,
        }

        projects.push(Project {
            full_path: Path::new(workspace).join(&name).to_string_lossy().to_string(),
            name,
            parent_workspace: workspace.to_string(),
            git_status: None,
        });
    }

    projects.sort_by(|a, b| compare_names(&a.name, &b.name));
    projects
}

/// Case-insensitive name order with a case-sensitive tiebreak, so `alpha`,
/// `Beta` and `beta` sort the way a user-facing list expects.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    let folded = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));
    match folded {
        // Lowercase before uppercase on ties
        Ordering::Equal => b.cmp(a),
        other => other,
    }
}
