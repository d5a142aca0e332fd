use std::path::PathBuf;
use std::str::FromStr;

/// Process settings, read once from `ROOMD_*` environment variables.
/// Missing or unparseable values fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub max_connections: usize,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    /// Replace the room set with the default layout at startup.
    pub reseed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 5000,
            data_dir: PathBuf::from("./data"),
            max_connections: 256,
            compact_threshold: 1000,
            metrics_port: None,
            reseed: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            bind: lookup("ROOMD_BIND").unwrap_or(defaults.bind),
            port: parse_var(&lookup, "ROOMD_PORT").unwrap_or(defaults.port),
            data_dir: lookup("ROOMD_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            max_connections: parse_var(&lookup, "ROOMD_MAX_CONNECTIONS")
                .unwrap_or(defaults.max_connections),
            compact_threshold: parse_var(&lookup, "ROOMD_COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold),
            metrics_port: parse_var(&lookup, "ROOMD_METRICS_PORT"),
            reseed: lookup("ROOMD_RESEED").is_some_and(|v| is_truthy(&v)),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("rooms.wal")
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|raw| raw.trim().parse().ok())
}

fn is_truthy(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
