use crate::{config::ConfigurationList, error::InternalError};
use std::{fs, path::Path};
use toml::{Table, Value as TomlValue};

/// Prefix of environment variables that override configuration keys.
pub const ENV_PREFIX: &str = "PLINTH_";

impl ConfigurationList {
    /// Load a flat TOML table. Scalars are stringified in document order.
    pub fn from_toml_str(text: &str) -> Result<Self, InternalError> {
        let table = parse_table(text)?;

        from_table(&table, "")
    }

    /// Load the table named `section` from a TOML document.
    pub fn from_toml_section(text: &str, section: &str) -> Result<Self, InternalError> {
        let table = parse_table(text)?;

        match table.get(section) {
            Some(TomlValue::Table(inner)) => from_table(inner, section),
            Some(_) => Err(InternalError::config(format!(
                "configuration section '{section}' is not a table"
            ))),
            None => Err(InternalError::config(format!(
                "configuration section '{section}' not found"
            ))),
        }
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, InternalError> {
        Self::from_toml_str(&read_file(path.as_ref())?)
    }

    pub fn from_toml_file_section(
        path: impl AsRef<Path>,
        section: &str,
    ) -> Result<Self, InternalError> {
        Self::from_toml_section(&read_file(path.as_ref())?, section)
    }

    /// Apply `PLINTH_<KEY>` variables from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(std::env::vars())
    }

    /// Apply `PLINTH_<KEY>` pairs from an explicit source. The key part is
    /// lower-cased; unknown keys are appended.
    #[must_use]
    pub fn with_overrides_from<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            let key = key.to_ascii_lowercase();
            tracing::debug!(key = %key, "configuration overridden from environment");
            self.set(key, value);
        }

        self
    }
}

fn read_file(path: &Path) -> Result<String, InternalError> {
    fs::read_to_string(path).map_err(|err| {
        InternalError::config(format!("read configuration '{}': {err}", path.display()))
    })
}

fn parse_table(text: &str) -> Result<Table, InternalError> {
    toml::from_str(text).map_err(|err| InternalError::config(format!("parse configuration: {err}")))
}

fn from_table(table: &Table, section: &str) -> Result<ConfigurationList, InternalError> {
    let mut list = ConfigurationList::new();

    for (key, value) in table {
        let text = match value {
            TomlValue::String(s) => s.clone(),
            TomlValue::Integer(i) => i.to_string(),
            TomlValue::Float(f) => f.to_string(),
            TomlValue::Boolean(b) => b.to_string(),
            TomlValue::Datetime(d) => d.to_string(),
            TomlValue::Array(_) | TomlValue::Table(_) => {
                let path = if section.is_empty() {
                    key.clone()
                } else {
                    format!("{section}.{key}")
                };
                return Err(InternalError::config(format!(
                    "configuration key '{path}' must be a scalar"
                )));
            }
        };
        list.push(key.as_str(), text)?;
    }

    Ok(list)
}
