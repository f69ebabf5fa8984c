//! Startup collaborators: configuration, logging, account and proxy sources,
//! session backups and update checks.

pub mod accounts;
pub mod config;
pub mod logger;
pub mod proxies;
pub mod session_backup;
pub mod update;
