//! Workspace engine - persisted workspace settings and project aggregation
//!
//! This module provides:
//! - Typed key-value persistence with default-on-corruption reads
//! - Project discovery under workspace folders
//! - The state manager that loads, aggregates and mutates
//! - Derived list views for presentation layers

pub mod config;
pub mod manager;
pub mod scanner;
pub mod state;
pub mod store;
pub mod view;

pub use config::{ProbeConfig, Settings};
pub use manager::{WorkspaceError, WorkspaceManager};
pub use scanner::list_projects;
pub use state::{App, Direction, GitStatus, Project, WorkspaceState};
pub use store::{FileStore, KeyValueStore, MemoryStore, Storage, StoreError};
pub use view::{AppChoice, OnboardingProgress, ProjectSections, TerminalChoice};
