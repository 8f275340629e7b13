//! Server configuration, populated from environment variables.

use std::net::SocketAddr;

/// Runtime configuration for a runledger server.
///
/// All fields are populated from environment variables with sensible
/// defaults, so a server can be started with zero configuration.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `RUNLEDGER_BIND` | `127.0.0.1:5000` | TCP socket address to listen on |
/// | `RUNLEDGER_DB` | (absent = in-memory) | Path to the SQLite database file |
/// | `RUNLEDGER_DEFAULT_ARTIFACT_ROOT` | `./mlruns` | Root for experiments created without an artifact location |
/// | `RUNLEDGER_API_PREFIX` | `/api/2.0/mlflow` | Path prefix for every operation route |
/// | `RUNLEDGER_MAX_BODY_BYTES` | `1048576` | Largest accepted request body |
/// | `RUNLEDGER_REQUEST_TIMEOUT_SECS` | `30` | Per-request deadline; `0` disables it |
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address the server binds to.
    pub bind_addr: SocketAddr,

    /// Path to the SQLite database file.
    /// `None` means use an in-memory store (data is lost on restart).
    pub db_path: Option<String>,

    /// Artifact root as configured. Normalised at startup before use.
    pub default_artifact_root: String,

    /// Prefix prepended to every operation path, without a trailing slash.
    pub api_prefix: String,

    pub max_body_bytes: usize,

    /// Seconds before an in-flight request is abandoned. `0` disables.
    pub request_timeout_secs: u64,
}

/// An environment variable held a value that could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("{var} is invalid ({value:?}): {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            db_path: None,
            default_artifact_root: "./mlruns".into(),
            api_prefix: "/api/2.0/mlflow".into(),
            max_body_bytes: 1024 * 1024,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Populate config from environment variables, applying defaults where absent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_addr = parse_var(&lookup, "RUNLEDGER_BIND", defaults.bind_addr)?;
        let max_body_bytes =
            parse_var(&lookup, "RUNLEDGER_MAX_BODY_BYTES", defaults.max_body_bytes)?;
        let request_timeout_secs = parse_var(
            &lookup,
            "RUNLEDGER_REQUEST_TIMEOUT_SECS",
            defaults.request_timeout_secs,
        )?;

        let api_prefix = lookup("RUNLEDGER_API_PREFIX")
            .map(|p| p.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_prefix);
        if !api_prefix.is_empty() && !api_prefix.starts_with('/') {
            return Err(ConfigError {
                var: "RUNLEDGER_API_PREFIX",
                value: api_prefix,
                reason: "must start with '/'".into(),
            });
        }

        Ok(Self {
            bind_addr,
            db_path: lookup("RUNLEDGER_DB").filter(|p| !p.is_empty()),
            default_artifact_root: lookup("RUNLEDGER_DEFAULT_ARTIFACT_ROOT")
                .filter(|r| !r.is_empty())
                .unwrap_or(defaults.default_artifact_root),
            api_prefix,
            max_body_bytes,
            request_timeout_secs,
        })
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => match value.parse::<T>() {
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(ConfigError {
                var,
                reason: e.to_string(),
                value,
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.bind_addr.port(), 5000);
        assert_eq!(cfg.api_prefix, "/api/2.0/mlflow");
        assert!(cfg.db_path.is_none());
    }

    #[test]
    fn prefix_loses_trailing_slash() {
        let cfg = ServerConfig::from_lookup(lookup(&[("RUNLEDGER_API_PREFIX", "/api/")])).unwrap();
        assert_eq!(cfg.api_prefix, "/api");
    }

    #[test]
    fn bad_bind_is_reported() {
        let err = ServerConfig::from_lookup(lookup(&[("RUNLEDGER_BIND", "nope")])).unwrap_err();
        assert_eq!(err.var, "RUNLEDGER_BIND");
    }

    #[test]
    fn bad_timeout_is_reported() {
        let err =
            ServerConfig::from_lookup(lookup(&[("RUNLEDGER_REQUEST_TIMEOUT_SECS", "-1")]))
                .unwrap_err();
        assert_eq!(err.var, "RUNLEDGER_REQUEST_TIMEOUT_SECS");
    }
}
