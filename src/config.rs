//! CLI flags and the JSON configuration documents described in the external
//! interfaces: start-pos-file, db-config-file, lookup-config-file, and the
//! optional db-credentials-file.

use crate::errors::{PlayerError, PlayerResult};
use crate::types::StartPositionFile;
use clap::Parser;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Parser, Debug)]
#[command(
    name = "binlog-player",
    about = "Replays a keyrange-filtered change stream onto a local database",
    version
)]
pub struct Args {
    /// Port for the status/health HTTP endpoint. 0 disables it.
    #[arg(long, default_value_t = 0)]
    pub port: u16,

    /// Path to the start-position JSON document.
    #[arg(long = "start-pos-file")]
    pub start_pos_file: String,

    /// Use the saved recovery checkpoint instead of the start-position file's position.
    #[arg(long = "use-checkpoint", default_value_t = false)]
    pub use_checkpoint: bool,

    /// Path to the primary database JSON config.
    #[arg(long = "db-config-file")]
    pub db_config_file: String,

    /// Path to the lookup database JSON config.
    #[arg(long = "lookup-config-file", default_value_t = String::new())]
    pub lookup_config_file: String,

    /// Run in debug mode: print SQL instead of executing it.
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Comma-separated table allow-list. Empty means all tables.
    #[arg(long, default_value_t = String::new())]
    pub tables: String,

    /// Path to the db-credentials JSON document.
    #[arg(long = "db-credentials-file", default_value_t = String::new())]
    pub db_credentials_file: String,
}

impl Args {
    pub fn table_allow_list(&self) -> Option<Vec<String>> {
        let trimmed = self.tables.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(trimmed.split(',').map(|s| s.trim().to_string()).collect())
    }
}

/// Primary/lookup DB connection parameters, as loaded from `db-config-file`
/// or `lookup-config-file`.
#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Port")]
    pub port: u16,
    #[serde(rename = "Uname")]
    pub uname: String,
    #[serde(rename = "Pass", default)]
    pub pass: String,
    #[serde(rename = "Dbname")]
    pub dbname: String,
}

pub fn load_json<T: for<'de> Deserialize<'de>>(path: &str) -> PlayerResult<T> {
    let data = std::fs::read_to_string(Path::new(path))
        .map_err(|e| PlayerError::config(format!("error reading '{path}': {e}")))?;
    serde_json::from_str(&data)
        .map_err(|e| PlayerError::config(format!("error parsing '{path}': {e}")))
}

pub fn load_start_position(path: &str) -> PlayerResult<StartPositionFile> {
    let parsed: StartPositionFile = load_json(path)?;
    parsed
        .validate()
        .map_err(|e| PlayerError::config(format!("invalid start position in '{path}': {e}")))?;
    Ok(parsed)
}

/// Resolves the lookup DB password from the credentials file when the
/// lookup config itself leaves it blank. The first password listed for the
/// username is used.
pub fn resolve_password(mut db_config: DbConfig, credentials_file: &str) -> PlayerResult<DbConfig> {
    if !db_config.pass.is_empty() || credentials_file.is_empty() {
        return Ok(db_config);
    }
    let credentials: HashMap<String, Vec<String>> = load_json(credentials_file)?;
    if let Some(passwords) = credentials.get(&db_config.uname) {
        if let Some(first) = passwords.first() {
            db_config.pass = first.clone();
        }
    }
    Ok(db_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tables_flag_means_all_tables() {
        let args = Args {
            port: 0,
            start_pos_file: "s".into(),
            use_checkpoint: false,
            db_config_file: "d".into(),
            lookup_config_file: String::new(),
            debug: false,
            tables: "  ".into(),
            db_credentials_file: String::new(),
        };
        assert_eq!(args.table_allow_list(), None);
    }

    #[test]
    fn tables_flag_splits_and_trims() {
        let args = Args {
            port: 0,
            start_pos_file: "s".into(),
            use_checkpoint: false,
            db_config_file: "d".into(),
            lookup_config_file: String::new(),
            debug: false,
            tables: "a, b ,c".into(),
            db_credentials_file: String::new(),
        };
        assert_eq!(
            args.table_allow_list(),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
    }
}
