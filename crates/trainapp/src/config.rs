//! Hook argument overrides read from a JSON config file.
//!
//! A config file is a flat JSON object mapping parameter names to values:
//!
//! ```json
//! { "epochs": 5, "lr": 0.01, "activation": "gelu" }
//! ```
//!
//! Values override hook defaults and are overridden by command-line flags.

use std::collections::BTreeMap;
use std::path::Path;

use trainapp_core::{Param, ParamValue};

use crate::error::{AppError, Result};

/// Parameter values loaded from a config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    values: BTreeMap<String, ParamValue>,
}

impl ConfigFile {
    /// Load a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&text)
            .map_err(|e| AppError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse config JSON.
    pub fn from_json(text: &str) -> std::result::Result<Self, serde_json::Error> {
        let values: BTreeMap<String, ParamValue> = serde_json::from_str(text)?;
        Ok(Self { values })
    }

    /// The value for `param`, converted to its declared kind.
    pub fn value_for(&self, param: &Param) -> Result<Option<ParamValue>> {
        match self.values.get(param.name()) {
            Some(value) => Ok(Some(param.kind().coerce(param.name(), value.clone())?)),
            None => Ok(None),
        }
    }

    /// Names present in the file.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Whether the file sets nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
