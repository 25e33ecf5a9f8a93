//! Typed access to `KEY=value` settings.
//!
//! The lookup is injected so configuration can be parsed from the process
//! environment or from an in-memory map in tests.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

pub struct EnvReader<'a> {
    lookup: Box<dyn Fn(&str) -> Option<String> + 'a>,
}

impl<'a> EnvReader<'a> {
    pub fn from_process() -> Self {
        Self {
            lookup: Box::new(|key| env::var(key).ok()),
        }
    }

    pub fn from_map(vars: &'a HashMap<String, String>) -> Self {
        Self {
            lookup: Box::new(move |key| vars.get(key).cloned()),
        }
    }

    pub fn string(&self, key: &str, default: &str) -> String {
        (self.lookup)(key).unwrap_or_else(|| default.to_string())
    }

    pub fn parse<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match (self.lookup)(key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .context(format!("Failed to parse {}", key)),
            None => Ok(default),
        }
    }

    /// Unset or empty means `None`
    pub fn parse_optional<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match (self.lookup)(key) {
            Some(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .context(format!("Failed to parse {}", key)),
            _ => Ok(None),
        }
    }

    /// Lenient: unparsable values fall back to the default
    pub fn parse_bool(&self, key: &str, default: bool) -> bool {
        (self.lookup)(key)
            .and_then(|raw| raw.trim().to_lowercase().parse::<bool>().ok())
            .unwrap_or(default)
    }
}
