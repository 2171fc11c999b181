//! Runtime settings, read from an optional `kindred.{toml,json,yaml,...}`
//! file in the working directory and overridden by `KINDRED_*` environment
//! variables (`KINDRED_SCRIPT_PATH` takes a `:`-separated list).

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;
use crate::persist::PersistenceMode;
use crate::validate::ValidationOptions;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Record text to load when the store is empty.
    pub gedcom: Option<String>,
    /// SQLite file backing the store; in memory when unset.
    pub database: Option<String>,
    /// Script to run.
    pub script: Option<String>,
    /// Procedure the script starts in.
    pub entry: String,
    /// Directories searched for scripts and includes, in order.
    pub script_path: Vec<String>,
    pub require_names: bool,
    /// Tracing filter used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gedcom: None,
            database: None,
            script: None,
            entry: "main".to_string(),
            script_path: vec![".".to_string()],
            require_names: false,
            log_filter: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::load_from("kindred")
    }

    /// Reads settings with `file` as the base name of the optional file.
    pub fn load_from(file: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix("KINDRED")
                    .try_parsing(true)
                    .list_separator(":")
                    .with_list_parse_key("script_path"),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn persistence(&self) -> PersistenceMode {
        match &self.database {
            Some(path) => PersistenceMode::File(path.clone()),
            None => PersistenceMode::InMemory,
        }
    }
    pub fn validation(&self) -> ValidationOptions {
        ValidationOptions { require_names: self.require_names }
    }
}
