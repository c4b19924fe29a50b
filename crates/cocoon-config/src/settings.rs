//! Raw persisted settings: a section/key/value store backed by a TOML file.
//!
//! The store is deliberately untyped. Unknown sections and keys survive a
//! load/save round trip, so a newer wrapper's settings are not destroyed by
//! an older one running a metamorphosis command.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use toml::{Table, Value};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::keys;

/// Maximum accepted size of a settings file.
const MAX_SETTINGS_FILE_SIZE: u64 = 1024 * 1024;

/// Section/key/value settings as persisted on disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    table: Table,
}

impl Settings {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from TOML text. `origin` names the source in errors.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] if the text is not valid TOML.
    pub fn parse(content: &str, origin: &str) -> ConfigResult<Self> {
        let table = content
            .parse::<Table>()
            .map_err(|e| ConfigError::ParseError {
                path: origin.to_owned(),
                source: e,
            })?;
        Ok(Self { table })
    }

    /// Load settings from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is larger than the
    /// accepted limit, or is not valid TOML.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        if metadata.len() > MAX_SETTINGS_FILE_SIZE {
            return Err(ConfigError::ValidationError {
                field: path.display().to_string(),
                message: format!(
                    "settings file is {} bytes, exceeding the {MAX_SETTINGS_FILE_SIZE} byte limit",
                    metadata.len()
                ),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        debug!(path = %path.display(), "loaded settings");
        Self::parse(&content, &path.display().to_string())
    }

    /// Persist settings to `path`.
    ///
    /// The new content is written to a temporary file in the same directory
    /// and renamed over the target, so readers never observe a partial file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem step fails.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = self.to_toml_string()?;
        let write_err = |e: std::io::Error| ConfigError::WriteError {
            path: path.display().to_string(),
            source: e,
        };

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut staged = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
        staged.write_all(content.as_bytes()).map_err(write_err)?;
        staged.as_file().sync_all().map_err(write_err)?;
        staged.persist(path).map_err(|e| write_err(e.error))?;

        debug!(path = %path.display(), "saved settings");
        Ok(())
    }

    /// Serialize to TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be represented as TOML.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string(&self.table)?)
    }

    /// Raw value of `section.key`. [`keys::ROOT`] addresses root-level keys.
    ///
    /// Scalars are rendered as text; arrays and tables are not settings and
    /// read as absent.
    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        let value = if section == keys::ROOT {
            self.table.get(key)?
        } else {
            self.table.get(section)?.as_table()?.get(key)?
        };
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Boolean(b) => Some(b.to_string()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Datetime(d) => Some(d.to_string()),
            Value::Array(_) | Value::Table(_) => None,
        }
    }

    /// Value of `section.key`, or `default` when absent or empty.
    #[must_use]
    pub fn value_or(&self, section: &str, key: &str, default: &str) -> String {
        self.get(section, key)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_owned())
    }

    /// Set `section.key` to a string value, creating the section if needed.
    ///
    /// A non-table value occupying the section name is replaced.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        let value = Value::String(value.into());
        if section == keys::ROOT {
            self.table.insert(key.to_owned(), value);
            return;
        }

        let entry = self
            .table
            .entry(section.to_owned())
            .or_insert_with(|| Value::Table(Table::new()));
        if !entry.is_table() {
            *entry = Value::Table(Table::new());
        }
        if let Value::Table(section_table) = entry {
            section_table.insert(key.to_owned(), value);
        }
    }

    /// Record when the settings were last mutated by a metamorphosis command.
    pub fn stamp_metamorphosis(&mut self, at: DateTime<Utc>) {
        self.set(keys::METAMORPHOSIS, keys::DATE, at.to_rfc3339());
    }

    /// Whether the store holds no sections and no root keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
