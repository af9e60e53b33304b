use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::runtime::{RunnerOptions, DEFAULT_POLL_INTERVAL};

/// Private key variable, hex with or without `0x`
pub const PRIVATE_KEY_VAR: &str = "PRIVATE_KEY";
/// Network selected when `--network` is not given
pub const NETWORK_VAR: &str = "NETWORK";
/// Endpoint used when no network is selected
pub const RPC_URL_VAR: &str = "RPC_URL";
/// Explorer key variables, first match wins
pub const EXPLORER_KEY_VARS: [&str; 2] = ["EXPLORER_API_KEY", "POLYGONSCAN_API_KEY"];

const DEFAULT_RPC: &str = "http://127.0.0.1:8545";
const DEFAULT_MANIFEST: &str = "chaincall.toml";
const JOURNAL_FILE: &str = "journal.sqlite3";

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    /// May reference the environment as `${VAR}`
    pub rpc: String,
    pub chain_id: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub default_network: Option<String>,

    #[serde(default)]
    pub networks: Vec<NetworkConfig>,

    #[serde(default)]
    pub artifact_paths: Vec<String>,

    pub manifest: Option<String>,

    /// Journal submissions to SQLite (on unless disabled)
    pub journal: Option<bool>,

    pub poll_interval_ms: Option<u64>,

    pub confirmation_timeout_secs: Option<u64>,
}

impl Config {
    pub fn network(&self, name: &str) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.name == name)
    }
}

/// Values given on the command line, taking precedence over everything else
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub network: Option<String>,
    pub rpc: Option<String>,
    pub manifest: Option<PathBuf>,
}

/// Fully resolved settings, built once at startup and passed down explicitly
#[derive(Debug, Clone)]
pub struct Settings {
    pub network: String,
    pub rpc_url: String,
    pub expected_chain_id: Option<u64>,
    pub private_key: Option<String>,
    pub explorer_api_key: Option<String>,
    pub artifact_roots: Vec<PathBuf>,
    pub manifest_path: PathBuf,
    pub journal: bool,
    /// SQLite journal location, `None` when no data directory can be found
    pub journal_path: Option<PathBuf>,
    pub runner: RunnerOptions,
}

impl Settings {
    /// Merge file config, command line and environment (`env` is the lookup)
    pub fn resolve(
        config: &Config,
        overrides: &Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let network_name = overrides
            .network
            .clone()
            .or_else(|| non_empty(env(NETWORK_VAR)))
            .or_else(|| config.default_network.clone());

        let (network, rpc_url, expected_chain_id) = match (&overrides.rpc, &network_name) {
            (Some(rpc), name) => (
                name.clone().unwrap_or_else(|| "custom".to_string()),
                rpc.clone(),
                None,
            ),
            (None, Some(name)) => {
                let Some(network) = config.network(name) else {
                    bail!("unknown network '{name}'");
                };
                let rpc = expand_env(&network.rpc, &env)
                    .with_context(|| format!("network '{name}' rpc"))?;
                (name.clone(), rpc, network.chain_id)
            }
            (None, None) => (
                "default".to_string(),
                non_empty(env(RPC_URL_VAR)).unwrap_or_else(|| DEFAULT_RPC.to_string()),
                None,
            ),
        };

        let explorer_api_key = EXPLORER_KEY_VARS
            .iter()
            .find_map(|var| non_empty(env(var)));

        let mut artifact_roots: Vec<PathBuf> =
            config.artifact_paths.iter().map(PathBuf::from).collect();
        if artifact_roots.is_empty() {
            artifact_roots.push(PathBuf::from("."));
        }

        let manifest_path = overrides
            .manifest
            .clone()
            .or_else(|| config.manifest.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST));

        let runner = RunnerOptions {
            poll_interval: config
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            confirmation_timeout: config.confirmation_timeout_secs.map(Duration::from_secs),
        };

        Ok(Self {
            network,
            rpc_url,
            expected_chain_id,
            private_key: non_empty(env(PRIVATE_KEY_VAR)),
            explorer_api_key,
            artifact_roots,
            manifest_path,
            journal: config.journal.unwrap_or(true),
            journal_path: data_dir(&env).map(|dir| dir.join(JOURNAL_FILE)),
            runner,
        })
    }

    /// Explorer key for display: the first four characters, the rest masked
    pub fn masked_explorer_key(&self) -> Option<String> {
        self.explorer_api_key.as_deref().map(|key| {
            let shown: String = key.chars().take(4).collect();
            if key.chars().count() <= 4 {
                "****".to_string()
            } else {
                format!("{shown}****")
            }
        })
    }

    /// Private key, required by anything that signs
    pub fn require_private_key(&self) -> Result<&str> {
        match self.private_key.as_deref() {
            Some(key) => Ok(key),
            None => bail!("{PRIVATE_KEY_VAR} is not set"),
        }
    }
}

pub fn load() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => return Config::default(),
    };
    match toml::from_str::<Config>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(path = %path.display(), "ignoring unreadable config: {err}");
            Config::default()
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("CHAINCALL_CONFIG").map(PathBuf::from) {
        return Some(path);
    }
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from) {
        return Some(xdg.join("chaincall").join("config.toml"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(home.join(".config").join("chaincall").join("config.toml"));
    }

    directories::ProjectDirs::from("io", "chaincall", "chaincall")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Data directory from `XDG_DATA_HOME` or `HOME` in `env`
pub fn data_dir(env: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(xdg) = non_empty(env("XDG_DATA_HOME")).map(PathBuf::from) {
        return Some(xdg.join("chaincall"));
    }
    if let Some(home) = non_empty(env("HOME")).map(PathBuf::from) {
        return Some(home.join(".local").join("share").join("chaincall"));
    }
    directories::ProjectDirs::from("io", "chaincall", "chaincall")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Replace `${VAR}` references with values from `env`
pub fn expand_env(input: &str, env: impl Fn(&str) -> Option<String>) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            bail!("unterminated ${{ in '{input}'");
        };
        let var = &after[..end];
        let value = env(var).with_context(|| format!("environment variable {var} is not set"))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const CONFIG: &str = r#"
default_network = "mumbai"
artifact_paths = ["contracts/collectable"]
confirmation_timeout_secs = 600

[[networks]]
name = "mumbai"
rpc = "https://polygon-mumbai.g.alchemy.com/v2/${ALCHEMY_API_KEY}"
chain_id = 80001

[[networks]]
name = "matic"
rpc = "https://polygon-mainnet.g.alchemy.com/v2/${ALCHEMY_API_KEY}"
"#;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_expand_env() {
        let env = env_of(&[("KEY", "abc")]);
        assert_eq!(expand_env("https://x/v2/${KEY}", &env).unwrap(), "https://x/v2/abc");
        assert_eq!(expand_env("no refs", &env).unwrap(), "no refs");
        assert!(expand_env("https://x/${MISSING}", &env).is_err());
        assert!(expand_env("https://x/${KEY", &env).is_err());
    }

    #[test]
    fn test_resolve_default_network() {
        let config: Config = toml::from_str(CONFIG).unwrap();
        let env = env_of(&[("ALCHEMY_API_KEY", "k1"), ("PRIVATE_KEY", "00ff"), ("POLYGONSCAN_API_KEY", "scan")]);

        let settings = Settings::resolve(&config, &Overrides::default(), env).unwrap();
        assert_eq!(settings.network, "mumbai");
        assert_eq!(settings.rpc_url, "https://polygon-mumbai.g.alchemy.com/v2/k1");
        assert_eq!(settings.expected_chain_id, Some(80001));
        assert_eq!(settings.require_private_key().unwrap(), "00ff");
        assert_eq!(settings.explorer_api_key.as_deref(), Some("scan"));
        assert_eq!(settings.artifact_roots, vec![PathBuf::from("contracts/collectable")]);
        assert_eq!(settings.runner.confirmation_timeout, Some(Duration::from_secs(600)));
        assert_eq!(settings.runner.poll_interval, DEFAULT_POLL_INTERVAL);
        assert!(settings.journal);
    }

    #[test]
    fn test_network_env_and_overrides() {
        let config: Config = toml::from_str(CONFIG).unwrap();

        let env = env_of(&[("ALCHEMY_API_KEY", "k2"), ("NETWORK", "matic")]);
        let settings = Settings::resolve(&config, &Overrides::default(), env).unwrap();
        assert_eq!(settings.network, "matic");
        assert!(settings.require_private_key().is_err());

        let overrides = Overrides {
            rpc: Some("http://localhost:8545".into()),
            ..Default::default()
        };
        let settings = Settings::resolve(&config, &overrides, env_of(&[])).unwrap();
        assert_eq!(settings.rpc_url, "http://localhost:8545");

        let overrides = Overrides {
            network: Some("goerli".into()),
            ..Default::default()
        };
        assert!(Settings::resolve(&config, &overrides, env_of(&[])).is_err());
    }

    #[test]
    fn test_empty_config_falls_back_to_rpc_url() {
        let settings = Settings::resolve(
            &Config::default(),
            &Overrides::default(),
            env_of(&[("RPC_URL", "http://node:8545")]),
        )
        .unwrap();
        assert_eq!(settings.rpc_url, "http://node:8545");
        assert_eq!(settings.artifact_roots, vec![PathBuf::from(".")]);
        assert_eq!(settings.manifest_path, PathBuf::from(DEFAULT_MANIFEST));
    }

    #[test]
    fn test_journal_path_follows_lookup() {
        let settings = Settings::resolve(
            &Config::default(),
            &Overrides::default(),
            env_of(&[("XDG_DATA_HOME", "/srv/data"), ("HOME", "/home/ops")]),
        )
        .unwrap();
        assert_eq!(
            settings.journal_path,
            Some(PathBuf::from("/srv/data/chaincall/journal.sqlite3"))
        );

        let settings = Settings::resolve(
            &Config::default(),
            &Overrides::default(),
            env_of(&[("HOME", "/home/ops")]),
        )
        .unwrap();
        assert_eq!(
            settings.journal_path,
            Some(PathBuf::from("/home/ops/.local/share/chaincall/journal.sqlite3"))
        );
    }

    #[test]
    fn test_explorer_key_is_masked() {
        let env = env_of(&[("EXPLORER_API_KEY", "ABCD1234SECRET")]);
        let settings = Settings::resolve(&Config::default(), &Overrides::default(), env).unwrap();
        assert_eq!(settings.masked_explorer_key().as_deref(), Some("ABCD****"));

        let env = env_of(&[("EXPLORER_API_KEY", "abc")]);
        let settings = Settings::resolve(&Config::default(), &Overrides::default(), env).unwrap();
        assert_eq!(settings.masked_explorer_key().as_deref(), Some("****"));

        let settings =
            Settings::resolve(&Config::default(), &Overrides::default(), env_of(&[])).unwrap();
        assert!(settings.masked_explorer_key().is_none());
    }
}
