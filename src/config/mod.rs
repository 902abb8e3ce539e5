// dbdump/src/config/mod.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CONFIG_ENV_VAR: &str = "DBDUMP_CONFIG";
const CONFIG_DIR_NAME: &str = "dbdump";
const CONFIG_FILE_NAME: &str = "dbdump.yaml";
const FALLBACK_DUMP_PATH: &str = ".";

// Structs for (de)serializing the YAML document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredConnection {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub default_database: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawYamlConfig {
    #[serde(default)]
    pub version: String,
    /// Ordered list of single-key maps: `- <tag>: { host: .., .. }`
    #[serde(default)]
    pub stored_connections: Vec<BTreeMap<String, StoredConnection>>,
    #[serde(default)]
    pub default_dump_path: String,
}

/// One named connection as the wizard sees it. Never mutated after loading.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub tag: String,
    pub host: String,
    pub user: String,
    pub password: String,
    pub port: Option<u16>,
    /// Driver identifier as written in the configuration (`provider`).
    pub driver: String,
    pub default_database: Option<String>,
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("tag", &self.tag)
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"****")
            .field("port", &self.port)
            .field("driver", &self.driver)
            .field("default_database", &self.default_database)
            .finish()
    }
}

impl ConnectionProfile {
    /// `user@host[:port]`, safe to print.
    pub fn endpoint(&self) -> String {
        match self.port {
            Some(port) => format!("{}@{}:{}", self.user, self.host, port),
            None => format!("{}@{}", self.user, self.host),
        }
    }
}

/// Source of the ordered connection profiles offered on the first wizard screen.
pub trait ConnectionRegistry {
    fn list_connections(&self) -> Vec<ConnectionProfile>;
}

impl ConnectionRegistry for Vec<ConnectionProfile> {
    fn list_connections(&self) -> Vec<ConnectionProfile> {
        self.clone()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub path: PathBuf,
    pub raw_yaml_config: RawYamlConfig,
}

impl AppConfig {
    pub fn load_from_yaml(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path).with_context(|| {
            format!(
                "Failed to read config file at {}. Run `dbdump config init` to create one",
                config_path.display()
            )
        })?;
        let raw_yaml_config = parse_config(&config_content).with_context(|| {
            format!(
                "Failed to parse YAML from config file at {}",
                config_path.display()
            )
        })?;
        debug!(
            path = %config_path.display(),
            connections = raw_yaml_config.stored_connections.len(),
            "Loaded configuration"
        );

        Ok(AppConfig {
            path: config_path.to_path_buf(),
            raw_yaml_config,
        })
    }

    /// Destination used when the operator confirms an empty path.
    pub fn default_destination(&self) -> String {
        let configured = self.raw_yaml_config.default_dump_path.trim();
        if configured.is_empty() {
            FALLBACK_DUMP_PATH.to_string()
        } else {
            configured.to_string()
        }
    }
}

impl ConnectionRegistry for AppConfig {
    fn list_connections(&self) -> Vec<ConnectionProfile> {
        profiles_from_raw(&self.raw_yaml_config)
    }
}

fn parse_config(content: &str) -> Result<RawYamlConfig> {
    // An empty file is a valid, empty document.
    if content.trim().is_empty() {
        return Ok(RawYamlConfig::default());
    }
    let raw: RawYamlConfig = serde_yaml::from_str(content)?;
    Ok(raw)
}

/// Flattens the tag → connection maps into profiles, keeping document order.
fn profiles_from_raw(raw: &RawYamlConfig) -> Vec<ConnectionProfile> {
    let mut seen = HashSet::new();
    let mut profiles = Vec::new();
    for entry in &raw.stored_connections {
        for (tag, conn) in entry {
            if !seen.insert(tag.clone()) {
                warn!(tag = %tag, "Duplicate connection tag in configuration, keeping the first one");
                continue;
            }
            profiles.push(ConnectionProfile {
                tag: tag.clone(),
                host: conn.host.clone(),
                user: conn.user.clone(),
                password: conn.password.clone(),
                port: conn.port,
                driver: conn.provider.clone(),
                default_database: conn.default_database.clone().filter(|db| !db.is_empty()),
            });
        }
    }
    profiles
}

/// Resolves the configuration file: explicit flag, then `$DBDUMP_CONFIG`, then `~/.config/dbdump/dbdump.yaml`.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .context("Could not determine the home directory; pass --config or set DBDUMP_CONFIG")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME))
}

/// Creates an empty configuration document. Returns `false` when one already exists.
pub fn init_config(config_path: &Path) -> Result<bool> {
    if config_path.exists() {
        return Ok(false);
    }
    write_config(config_path, &RawYamlConfig::default())?;
    Ok(true)
}

/// Overwrites the configuration with an empty document.
pub fn reset_config(config_path: &Path) -> Result<()> {
    write_config(config_path, &RawYamlConfig::default())
}

fn write_config(config_path: &Path, raw: &RawYamlConfig) -> Result<()> {
    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create config directory: {}", parent.display())
        })?;
    }
    let content = serde_yaml::to_string(raw).context("Failed to serialize configuration")?;
    fs::write(config_path, content)
        .with_context(|| format!("Failed to write config file at {}", config_path.display()))
}
