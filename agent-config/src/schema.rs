//! Strongly typed configuration schema.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::loader::EnvLookup;
use crate::{ConfigError, ConfigResult};

const PRIMARY_KEY_VARS: [&str; 2] = ["GOOGLE_API_KEY", "GEMINI_API_KEY"];
const FALLBACK_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY_SECONDARY", "GEMINI_API_KEY_THIRD"];

/// Complete foundry configuration.
#[derive(Clone, Debug, Default)]
pub struct FoundryConfig {
    /// Language-model access.
    pub generation: GenerationSettings,
    /// Synthesis and review loop.
    pub synthesis: SynthesisSettings,
    /// Catalog and artifact storage.
    pub storage: StorageSettings,
    /// Tool execution.
    pub execution: ExecutionSettings,
    /// Public credential discovery.
    pub discovery: DiscoverySettings,
    /// Logging.
    pub telemetry: TelemetrySettings,
}

impl FoundryConfig {
    /// Loads configuration from the process environment, reading a `.env`
    /// file in the working directory first when one exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when a variable is malformed.
    pub fn from_env() -> ConfigResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when a variable is malformed.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvLookup::new(lookup);
        let defaults = Self::default();

        let mut api_keys = Vec::new();
        if let Some(primary) = PRIMARY_KEY_VARS.iter().find_map(|key| env.optional(key)) {
            api_keys.push(primary);
        }
        for key in FALLBACK_KEY_VARS {
            if let Some(value) = env.optional(key) {
                if !api_keys.contains(&value) {
                    api_keys.push(value);
                }
            }
        }

        let generation = GenerationSettings {
            api_keys,
            model: env.string("FOUNDRY_MODEL", defaults.generation.model),
            timeout: Duration::from_secs(env.parse(
                "FOUNDRY_GENERATION_TIMEOUT_SECS",
                defaults.generation.timeout.as_secs(),
            )?),
        };

        let identifier_max_len = env.parse(
            "FOUNDRY_IDENTIFIER_MAX_LEN",
            defaults.synthesis.identifier_max_len,
        )?;
        if identifier_max_len == 0 {
            return Err(ConfigError::invalid(
                "FOUNDRY_IDENTIFIER_MAX_LEN",
                "must be greater than zero",
            ));
        }
        let synthesis = SynthesisSettings {
            review_retries: env.parse("FOUNDRY_REVIEW_RETRIES", defaults.synthesis.review_retries)?,
            identifier_max_len,
        };

        let data_dir = env
            .optional("FOUNDRY_DATA_DIR")
            .map_or(defaults.storage.data_dir, PathBuf::from);
        let tools_dir = env
            .optional("FOUNDRY_TOOLS_DIR")
            .map_or_else(|| data_dir.join("custom_tools"), PathBuf::from);
        let storage = StorageSettings {
            data_dir,
            tools_dir,
        };

        let execution = ExecutionSettings {
            python: env.string("FOUNDRY_PYTHON", defaults.execution.python),
            tool_timeout: Duration::from_secs(env.parse(
                "FOUNDRY_TOOL_TIMEOUT_SECS",
                defaults.execution.tool_timeout.as_secs(),
            )?),
            max_tool_rounds: env.parse(
                "FOUNDRY_MAX_TOOL_ROUNDS",
                defaults.execution.max_tool_rounds,
            )?,
            expose_all_when_unscoped: env.flag(
                "FOUNDRY_EXPOSE_ALL_TOOLS",
                defaults.execution.expose_all_when_unscoped,
            )?,
        };

        let discovery = DiscoverySettings {
            enabled: env.flag("FOUNDRY_DISCOVERY", defaults.discovery.enabled)?,
        };

        let telemetry = TelemetrySettings {
            filter: env.string("RUST_LOG", defaults.telemetry.filter),
            format: env.parse("FOUNDRY_LOG_FORMAT", defaults.telemetry.format)?,
        };

        Ok(Self {
            generation,
            synthesis,
            storage,
            execution,
            discovery,
            telemetry,
        })
    }
}

/// Language-model access settings.
#[derive(Clone)]
pub struct GenerationSettings {
    /// Ordered API keys; the first is primary, the rest are fallbacks.
    pub api_keys: Vec<String>,
    /// Model identifier used for synthesis, review and discovery.
    pub model: String,
    /// Upper bound for a single generation call.
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            model: "gemini-2.5-flash".to_owned(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl fmt::Debug for GenerationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationSettings")
            .field("api_keys", &self.api_keys.len())
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Synthesis and review loop settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SynthesisSettings {
    /// Additional synthesis attempts after an unsafe verdict.
    pub review_retries: u32,
    /// Maximum identifier length before collision suffixes.
    pub identifier_max_len: usize,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            review_retries: 2,
            identifier_max_len: 40,
        }
    }
}

/// Storage locations.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageSettings {
    /// Root directory of the document store.
    pub data_dir: PathBuf,
    /// Directory holding artifact source files.
    pub tools_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        let data_dir = PathBuf::from("data");
        Self {
            tools_dir: data_dir.join("custom_tools"),
            data_dir,
        }
    }
}

/// Tool execution settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionSettings {
    /// Interpreter binary used to run artifacts.
    pub python: String,
    /// Upper bound for one tool invocation.
    pub tool_timeout: Duration,
    /// Tool-call rounds allowed in a single agent turn.
    pub max_tool_rounds: usize,
    /// Whether unscoped loads expose every catalog artifact.
    pub expose_all_when_unscoped: bool,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            python: "python3".to_owned(),
            tool_timeout: Duration::from_secs(30),
            max_tool_rounds: 10,
            expose_all_when_unscoped: true,
        }
    }
}

/// Public credential discovery settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoverySettings {
    /// Whether the discovery step runs at all.
    pub enabled: bool,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Output format of the log subscriber.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-field human readable lines.
    #[default]
    Text,
    /// Condensed single-line output.
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "full" => Ok(Self::Text),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TelemetrySettings {
    /// `EnvFilter` directive string.
    pub filter: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
            format: LogFormat::Text,
        }
    }
}
