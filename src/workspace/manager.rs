//! Workspace state manager - loads persisted records, aggregates projects and
//! applies mutations.
//!
//! Every mutation runs against the latest in-memory snapshot while holding the
//! state lock, writes through to storage, and only then updates the mirror. A
//! failed write leaves the session state equal to what is persisted.

use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::scanner::list_projects;
use super::state::{App, Direction, Project, WorkspaceState};
use super::store::{KeyValueStore, Storage, StoreError};
use crate::git::GitProbe;

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Workspace already exists: {0}")]
    AlreadyExists(String),
    #[error("Storage error: {0}")]
    StorageError(#[from] StoreError),
}

pub struct WorkspaceManager {
    storage: Storage,
    probe: GitProbe,
    state: Mutex<WorkspaceState>,
}

impl WorkspaceManager {
    pub fn new(store: Arc<dyn KeyValueStore>, probe: GitProbe) -> Self {
        Self {
            storage: Storage::new(store),
            probe,
            state: Mutex::new(WorkspaceState::default()),
        }
    }

    /// Current in-memory snapshot
    pub async fn snapshot(&self) -> WorkspaceState {
        self.state.lock().await.clone()
    }

    /// Read all persisted records concurrently and replace the mirror with
    /// the resulting snapshot.
    ///
    /// The state lock is held across the reads so a mutation cannot commit
    /// between reading and replacing the mirror.
    pub async fn load_all(&self) -> WorkspaceState {
        let mut state = self.state.lock().await;
        let (
            workspaces,
            pinned_projects,
            default_app,
            terminal_app,
            workspace_apps,
            onboarding_completed,
        ) = tokio::join!(
            self.storage.workspaces(),
            self.storage.pinned_projects(),
            self.storage.default_app(),
            self.storage.terminal_app(),
            self.storage.workspace_apps(),
            self.storage.onboarding_completed(),
        );

        let loaded = WorkspaceState {
            workspaces,
            pinned_projects,
            default_app,
            terminal_app,
            workspace_apps,
            onboarding_completed,
        };

        debug!(
            workspaces = loaded.workspaces.len(),
            pinned = loaded.pinned_projects.len(),
            "Workspace state loaded"
        );

        *state = loaded.clone();
        loaded
    }

    /// Enumerate the projects of each workspace and attach git status.
    ///
    /// Output is grouped in workspace order, then by project name. Scans and
    /// probes run concurrently; a failing scan or probe only affects its own
    /// workspace or project.
    pub async fn aggregate_projects(&self, workspaces: &[String]) -> Vec<Project> {
        let scans = join_all(workspaces.iter().map(|ws| list_projects(ws))).await;
        let mut projects: Vec<Project> = scans.into_iter().flatten().collect();

        let statuses = join_all(
            projects
                .iter()
                .map(|p| self.probe.probe_status(&p.full_path)),
        )
        .await;

        // join_all yields in input order, so statuses line up with projects
        for (project, status) in projects.iter_mut().zip(statuses) {
            project.git_status = status;
        }

        debug!(
            workspaces = workspaces.len(),
            projects = projects.len(),
            "Projects aggregated"
        );
        projects
    }

    /// Aggregate projects for the workspaces currently in the mirror
    pub async fn refresh_projects(&self) -> Vec<Project> {
        let workspaces = self.state.lock().await.workspaces.clone();
        self.aggregate_projects(&workspaces).await
    }

    /// Append a workspace; exact duplicates are rejected
    pub async fn add_workspace(&self, path: &str) -> Result<(), WorkspaceError> {
        let mut state = self.state.lock().await;
        if state.contains_workspace(path) {
            return Err(WorkspaceError::AlreadyExists(path.to_string()));
        }

        let mut workspaces = state.workspaces.clone();
        workspaces.push(path.to_string());
        self.storage.save_workspaces(&workspaces).await?;
        state.workspaces = workspaces;

        info!(workspace = path, "Workspace added");
        Ok(())
    }

    /// Remove a workspace together with its app override. Pinned paths under
    /// it are kept; they simply stop matching any aggregated project.
    pub async fn remove_workspace(&self, path: &str) -> Result<(), WorkspaceError> {
        let mut state = self.state.lock().await;

        if state.contains_workspace(path) {
            let workspaces: Vec<String> = state
                .workspaces
                .iter()
                .filter(|w| w.as_str() != path)
                .cloned()
                .collect();
            self.storage.save_workspaces(&workspaces).await?;
            state.workspaces = workspaces;
        }

        if state.workspace_apps.contains_key(path) {
            let mut apps = state.workspace_apps.clone();
            apps.remove(path);
            self.storage.save_workspace_apps(&apps).await?;
            state.workspace_apps = apps;
        }

        info!(workspace = path, "Workspace removed");
        Ok(())
    }

    /// Swap the workspace at `index` with its neighbour; out-of-range moves
    /// are ignored.
    pub async fn move_workspace(
        &self,
        index: usize,
        direction: Direction,
    ) -> Result<(), WorkspaceError> {
        let mut state = self.state.lock().await;

        let target = match direction {
            Direction::Up => index.checked_sub(1),
            Direction::Down => index.checked_add(1),
        };
        let target = match target {
            Some(t) if index < state.workspaces.len() && t < state.workspaces.len() => t,
            _ => return Ok(()),
        };

        let mut workspaces = state.workspaces.clone();
        workspaces.swap(index, target);
        self.storage.save_workspaces(&workspaces).await?;
        state.workspaces = workspaces;

        debug!(from = index, to = target, "Workspace moved");
        Ok(())
    }

    /// Pin or unpin a project. Returns whether the project is now pinned.
    pub async fn toggle_pin(&self, project_path: &str) -> Result<bool, WorkspaceError> {
        let mut state = self.state.lock().await;

        let now_pinned = !state.is_pinned(project_path);
        let pinned: Vec<String> = if now_pinned {
            let mut pinned = state.pinned_projects.clone();
            pinned.push(project_path.to_string());
            pinned
        } else {
            state
                .pinned_projects
                .iter()
                .filter(|p| p.as_str() != project_path)
                .cloned()
                .collect()
        };

        self.storage.save_pinned_projects(&pinned).await?;
        state.pinned_projects = pinned;

        debug!(project = project_path, pinned = now_pinned, "Pin toggled");
        Ok(now_pinned)
    }

    pub async fn set_workspace_app(&self, path: &str, app: App) -> Result<(), WorkspaceError> {
        let mut state = self.state.lock().await;

        let mut apps = state.workspace_apps.clone();
        apps.insert(path.to_string(), app);
        self.storage.save_workspace_apps(&apps).await?;
        state.workspace_apps = apps;

        info!(workspace = path, "Workspace app set");
        Ok(())
    }

    pub async fn reset_workspace_app(&self, path: &str) -> Result<(), WorkspaceError> {
        let mut state = self.state.lock().await;

        let mut apps = state.workspace_apps.clone();
        apps.remove(path);
        self.storage.save_workspace_apps(&apps).await?;
        state.workspace_apps = apps;

        info!(workspace = path, "Workspace app reset");
        Ok(())
    }

    pub async fn set_default_app(&self, app: App) -> Result<(), WorkspaceError> {
        let mut state = self.state.lock().await;
        self.storage.save_default_app(&app).await?;
        info!(app = %app.name, "Default app set");
        state.default_app = Some(app);
        Ok(())
    }

    /// `None` clears the override back to the system default terminal
    pub async fn set_terminal_app(&self, app: Option<App>) -> Result<(), WorkspaceError> {
        let mut state = self.state.lock().await;
        self.storage.save_terminal_app(app.as_ref()).await?;
        info!(app = ?app.as_ref().map(|a| a.name.as_str()), "Terminal app set");
        state.terminal_app = app;
        Ok(())
    }

    /// Prerequisites (a workspace and a default app) are checked by the caller
    pub async fn set_onboarding_completed(&self, completed: bool) -> Result<(), WorkspaceError> {
        let mut state = self.state.lock().await;
        self.storage.save_onboarding_completed(completed).await?;
        state.onboarding_completed = completed;
        info!(completed, "Onboarding flag updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{GitRunner, ProbeError};
    use crate::workspace::store::{MemoryStore, KEY_WORKSPACES, KEY_WORKSPACE_APPS};
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::Duration;

    struct NoGit;

    #[async_trait]
    impl GitRunner for NoGit {
        async fn is_available(&self) -> bool {
            false
        }

        async fn query_status(&self, _dir: &Path) -> Result<String, ProbeError> {
            Err(ProbeError::Spawn("git disabled in tests".to_string()))
        }
    }

    /// Reads succeed, writes always fail
    struct ReadOnlyStore;

    #[async_trait]
    impl KeyValueStore for ReadOnlyStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        async fn set(&self, key: &str, _value: String) -> Result<(), StoreError> {
            Err(StoreError::WriteError(key.to_string(), "read-only".to_string()))
        }

        async fn remove(&self, key: &str) -> Result<(), StoreError> {
            Err(StoreError::WriteError(key.to_string(), "read-only".to_string()))
        }
    }

    /// Memory store whose reads stall, widening the window of `load_all`
    struct SlowReadStore {
        inner: MemoryStore,
        delay: Duration,
    }

    #[async_trait]
    impl KeyValueStore for SlowReadStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            let value = self.inner.get(key).await;
            tokio::time::sleep(self.delay).await;
            value
        }

        async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key).await
        }
    }

    fn manager() -> (Arc<MemoryStore>, WorkspaceManager) {
        let store = Arc::new(MemoryStore::new());
        let manager = WorkspaceManager::new(store.clone(), GitProbe::new(Arc::new(NoGit)));
        (store, manager)
    }

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_add_workspace_twice_is_rejected() {
        let (_, manager) = manager();
        manager.add_workspace("/p").await.unwrap();

        let err = manager.add_workspace("/p").await.unwrap_err();
        assert!(matches!(err, WorkspaceError::AlreadyExists(ref p) if p == "/p"));

        assert_eq!(manager.load_all().await.workspaces, paths(&["/p"]));
    }

    #[tokio::test]
    async fn test_add_workspace_is_case_sensitive() {
        let (_, manager) = manager();
        manager.add_workspace("/Code").await.unwrap();
        manager.add_workspace("/code").await.unwrap();
        assert_eq!(manager.snapshot().await.workspaces, paths(&["/Code", "/code"]));
    }

    #[tokio::test]
    async fn test_move_up_then_down_restores_order() {
        let (_, manager) = manager();
        for ws in ["/a", "/b", "/c"] {
            manager.add_workspace(ws).await.unwrap();
        }

        manager.move_workspace(2, Direction::Up).await.unwrap();
        assert_eq!(manager.snapshot().await.workspaces, paths(&["/a", "/c", "/b"]));

        manager.move_workspace(1, Direction::Down).await.unwrap();
        assert_eq!(manager.snapshot().await.workspaces, paths(&["/a", "/b", "/c"]));
    }

    #[tokio::test]
    async fn test_out_of_bounds_moves_are_noops() {
        let (_, manager) = manager();
        for ws in ["/a", "/b"] {
            manager.add_workspace(ws).await.unwrap();
        }

        manager.move_workspace(0, Direction::Up).await.unwrap();
        manager.move_workspace(1, Direction::Down).await.unwrap();
        manager.move_workspace(7, Direction::Up).await.unwrap();

        assert_eq!(manager.load_all().await.workspaces, paths(&["/a", "/b"]));
    }

    #[tokio::test]
    async fn test_toggle_pin_twice_restores_set() {
        let (_, manager) = manager();
        manager.toggle_pin("/a/one").await.unwrap();
        let before = manager.snapshot().await.pinned_projects;

        assert!(manager.toggle_pin("/a/two").await.unwrap());
        assert!(!manager.toggle_pin("/a/two").await.unwrap());

        assert_eq!(manager.load_all().await.pinned_projects, before);
    }

    #[tokio::test]
    async fn test_remove_workspace_drops_app_override_but_keeps_pins() {
        let (store, manager) = manager();
        manager.add_workspace("/a").await.unwrap();
        manager.add_workspace("/b").await.unwrap();
        manager
            .set_workspace_app("/a", App::new("Zed", "dev.zed.Zed"))
            .await
            .unwrap();
        manager.toggle_pin("/a/proj").await.unwrap();

        manager.remove_workspace("/a").await.unwrap();

        let state = manager.load_all().await;
        assert_eq!(state.workspaces, paths(&["/b"]));
        assert!(state.workspace_apps.is_empty());
        assert_eq!(state.pinned_projects, paths(&["/a/proj"]));

        let raw = store.get(KEY_WORKSPACE_APPS).await.unwrap().unwrap();
        assert_eq!(raw, "{}");
    }

    #[tokio::test]
    async fn test_reset_workspace_app() {
        let (_, manager) = manager();
        manager
            .set_workspace_app("/a", App::new("Zed", "dev.zed.Zed"))
            .await
            .unwrap();
        manager.reset_workspace_app("/a").await.unwrap();
        assert!(manager.load_all().await.workspace_apps.is_empty());
    }

    #[tokio::test]
    async fn test_global_apps_and_onboarding_persist() {
        let (_, manager) = manager();
        let editor = App::new("Cursor", "com.todesktop.cursor");
        let terminal = App::new("iTerm", "com.googlecode.iterm2");

        manager.set_default_app(editor.clone()).await.unwrap();
        manager.set_terminal_app(Some(terminal.clone())).await.unwrap();
        manager.set_onboarding_completed(true).await.unwrap();

        let state = manager.load_all().await;
        assert_eq!(state.default_app, Some(editor));
        assert_eq!(state.terminal_app, Some(terminal));
        assert!(state.onboarding_completed);

        manager.set_terminal_app(None).await.unwrap();
        assert!(manager.load_all().await.terminal_app.is_none());
    }

    #[tokio::test]
    async fn test_load_all_recovers_from_corrupt_records() {
        let (store, manager) = manager();
        store
            .set(KEY_WORKSPACES, "[\"/a\",".to_string())
            .await
            .unwrap();
        assert_eq!(manager.load_all().await, WorkspaceState::default());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_mirror_unchanged() {
        let manager =
            WorkspaceManager::new(Arc::new(ReadOnlyStore), GitProbe::new(Arc::new(NoGit)));

        let err = manager.add_workspace("/a").await.unwrap_err();
        assert!(matches!(err, WorkspaceError::StorageError(_)));
        assert!(manager.toggle_pin("/a/x").await.is_err());
        assert!(manager.set_onboarding_completed(true).await.is_err());

        assert_eq!(manager.snapshot().await, WorkspaceState::default());
    }

    #[tokio::test]
    async fn test_concurrent_mutations_do_not_lose_updates() {
        let (_, manager) = manager();
        let manager = Arc::new(manager);

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.add_workspace(&format!("/ws{}", i)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(manager.load_all().await.workspaces.len(), 8);
    }

    #[tokio::test]
    async fn test_load_all_does_not_clobber_concurrent_mutation() {
        let store = Arc::new(SlowReadStore {
            inner: MemoryStore::new(),
            delay: Duration::from_millis(100),
        });
        let manager = Arc::new(WorkspaceManager::new(
            store.clone(),
            GitProbe::new(Arc::new(NoGit)),
        ));

        let loading = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.load_all().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.add_workspace("/a").await.unwrap();
        loading.await.unwrap();

        let persisted = Storage::new(store).workspaces().await;
        assert_eq!(persisted, paths(&["/a"]));
        assert_eq!(manager.snapshot().await.workspaces, persisted);
        assert!(matches!(
            manager.add_workspace("/a").await,
            Err(WorkspaceError::AlreadyExists(_))
        ));

        manager.add_workspace("/b").await.unwrap();
        assert_eq!(manager.load_all().await.workspaces, paths(&["/a", "/b"]));
    }
}
