//! Typed accessors over a variable lookup.

use std::fmt::Display;
use std::str::FromStr;

use crate::{ConfigError, ConfigResult};

/// Wraps a `key -> value` lookup with typed parsing helpers.
///
/// Empty values are treated as unset.
pub struct EnvLookup<F> {
    lookup: F,
}

impl<F> EnvLookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Creates a lookup over the supplied function.
    pub fn new(lookup: F) -> Self {
        Self { lookup }
    }

    /// Returns the trimmed value of `key`, or `None` when unset or blank.
    pub fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    /// Returns the value of `key` or `default`.
    pub fn string(&self, key: &str, default: impl Into<String>) -> String {
        self.optional(key).unwrap_or_else(|| default.into())
    }

    /// Parses `key` into `T`, falling back to `default` when unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the value does not parse.
    pub fn parse<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.optional(key)
            .map(|raw| {
                raw.parse()
                    .map_err(|err| ConfigError::invalid(key, format!("{err}")))
            })
            .transpose()
            .map(|value| value.unwrap_or(default))
    }

    /// Parses a boolean flag. Accepts `true`/`1`/`yes` and `false`/`0`/`no`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for any other value.
    pub fn flag(&self, key: &str, default: bool) -> ConfigResult<bool> {
        match self.optional(key) {
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(ConfigError::invalid(
                    key,
                    format!("must be 'true' or 'false', got '{raw}'"),
                )),
            },
            None => Ok(default),
        }
    }
}
