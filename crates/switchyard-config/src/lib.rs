//! Environment settings and tool-server connection schema.
//!
//! This crate defines the configuration surface of switchyard:
//!
//! - [`Settings`] — Process settings read from the environment
//! - [`DatabaseConfig`] — Which store backend to connect to
//! - [`ToolServerConfig`] — Parsed form of an MCP record's `parameters`
//!
//! # Loading from the environment
//!
//! ```rust,ignore
//! use switchyard_config::Settings;
//!
//! dotenvy::dotenv().ok();
//! let settings = Settings::from_env()?;
//! ```
//!
//! # Tool-server parameters
//!
//! ```rust
//! use switchyard_config::ToolServerConfig;
//!
//! let params = serde_json::json!({
//!     "transport": "stdio",
//!     "command": "npx",
//!     "args": ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]
//! });
//! let config = ToolServerConfig::from_parameters("fs", &params).unwrap();
//! assert_eq!(config.transport_name(), "stdio");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Default model, `provider:model` form.
pub const DEFAULT_MODEL: &str = "anthropic:claude-sonnet-4-5-20250929";
/// Default SQLite path when no hosted database is configured.
pub const DEFAULT_SQLITE_PATH: &str = "data/switchyard.db";
/// Default bind address for the HTTP server.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
/// Default tool-loop bound for a single agent invocation.
pub const DEFAULT_MAX_ITERATIONS: usize = 25;

/// Errors that can occur when loading or parsing configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable is set but unusable.
    #[error("Invalid value for {name}: {message}")]
    InvalidValue { name: &'static str, message: String },

    /// A tool-server `parameters` document could not be interpreted.
    #[error("Invalid tool server '{server}': {message}")]
    InvalidToolServer { server: String, message: String },
}

impl ConfigError {
    fn tool_server(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidToolServer {
            server: server.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Process Settings
// ============================================================================

/// Store backend selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseConfig {
    /// Hosted Postgres behind PostgREST (Supabase).
    Supabase { url: String, api_key: String },
    /// Embedded SQLite database file (`:memory:` for a throwaway store).
    Sqlite { path: String },
}

/// Process-wide settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database: DatabaseConfig,
    /// Model identifier, optionally prefixed with `anthropic:` or `openai:`.
    pub model: String,
    /// Base URL for OpenAI-compatible endpoints.
    pub api_base: Option<String>,
    pub max_iterations: usize,
    pub bind_addr: String,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database = match get("SUPABASE_URL") {
            Some(url) => DatabaseConfig::Supabase {
                url: url.trim_end_matches('/').to_string(),
                api_key: get("SUPABASE_ANON_KEY").ok_or(ConfigError::Missing("SUPABASE_ANON_KEY"))?,
            },
            None => DatabaseConfig::Sqlite {
                path: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_SQLITE_PATH.into()),
            },
        };

        let max_iterations = match get("AGENT_MAX_ITERATIONS") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "AGENT_MAX_ITERATIONS",
                        message: format!("expected a positive integer, got '{}'", raw),
                    })
                }
            },
            None => DEFAULT_MAX_ITERATIONS,
        };

        Ok(Self {
            database,
            model: get("AGENT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            api_base: get("OPENAI_API_BASE"),
            max_iterations,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
        })
    }
}

// ============================================================================
// Tool-Server Connection Schema
// ============================================================================

/// Wire transport used to reach a tool server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Stdio,
    StreamableHttp,
    Sse,
}

impl FromStr for TransportKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdio" => Ok(Self::Stdio),
            "streamable_http" | "streamable-http" | "http" => Ok(Self::StreamableHttp),
            "sse" => Ok(Self::Sse),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stdio => "stdio",
            Self::StreamableHttp => "streamable_http",
            Self::Sse => "sse",
        };
        write!(f, "{}", s)
    }
}

/// Connection settings for one tool server, parsed from an MCP record.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolServerConfig {
    Stdio {
        command: String,
        args: Vec<String>,
        env: BTreeMap<String, String>,
        cwd: Option<String>,
    },
    StreamableHttp {
        url: String,
        headers: BTreeMap<String, String>,
    },
    Sse {
        url: String,
        headers: BTreeMap<String, String>,
    },
}

/// Loose shape of the `parameters` document; validated into [`ToolServerConfig`].
#[derive(Debug, Deserialize)]
struct RawParameters {
    #[serde(default)]
    transport: Option<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

impl ToolServerConfig {
    /// Interprets an MCP record's `parameters` for the server called `name`.
    ///
    /// When `transport` is absent it is inferred: `command` means stdio,
    /// `url` means streamable HTTP.
    pub fn from_parameters(name: &str, parameters: &serde_json::Value) -> Result<Self, ConfigError> {
        let raw: RawParameters = serde_json::from_value(parameters.clone())
            .map_err(|e| ConfigError::tool_server(name, e.to_string()))?;

        let kind = match raw.transport.as_deref() {
            Some(t) => t
                .parse::<TransportKind>()
                .map_err(|_| ConfigError::tool_server(name, format!("unsupported transport '{}'", t)))?,
            None if raw.command.is_some() => TransportKind::Stdio,
            None if raw.url.is_some() => TransportKind::StreamableHttp,
            None => {
                return Err(ConfigError::tool_server(
                    name,
                    "expected a 'command' or a 'url'",
                ))
            }
        };

        match kind {
            TransportKind::Stdio => {
                let command = raw
                    .command
                    .ok_or_else(|| ConfigError::tool_server(name, "stdio transport requires 'command'"))?;
                Ok(Self::Stdio {
                    command,
                    args: raw.args,
                    env: raw.env,
                    cwd: raw.cwd,
                })
            }
            TransportKind::StreamableHttp | TransportKind::Sse => {
                let url = raw
                    .url
                    .ok_or_else(|| ConfigError::tool_server(name, format!("{} transport requires 'url'", kind)))?;
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::tool_server(name, format!("'{}' is not an http(s) URL", url)));
                }
                Ok(match kind {
                    TransportKind::Sse => Self::Sse { url, headers: raw.headers },
                    _ => Self::StreamableHttp { url, headers: raw.headers },
                })
            }
        }
    }

    pub fn transport(&self) -> TransportKind {
        match self {
            Self::Stdio { .. } => TransportKind::Stdio,
            Self::StreamableHttp { .. } => TransportKind::StreamableHttp,
            Self::Sse { .. } => TransportKind::Sse,
        }
    }

    /// Returns the transport name for logging.
    pub fn transport_name(&self) -> String {
        self.transport().to_string()
    }
}
