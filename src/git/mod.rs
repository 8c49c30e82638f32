// Git module - read-only status queries against the system git binary

pub mod status;

pub use status::{GitProbe, GitRunner, ProbeError, ShellGitRunner};
