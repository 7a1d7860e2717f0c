use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context};
use homedir::my_home;
use serde::{Deserialize, Serialize};

use crate::metadata::{
    types::{ACCEPT_DEFAULT, FETCH_TIMEOUT_DEFAULT, USER_AGENT_DEFAULT},
    FetchOptions,
};

const CONFIG_FILE: &str = "config.yaml";
const LINKS_FILE: &str = "links.csv";
const LISTEN_ADDR_DEFAULT: &str = "0.0.0.0:8080";
const DEFAULT_USER: &str = "local";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Hard limit for a single page fetch
    #[serde(default = "fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "user_agent")]
    pub user_agent: String,

    #[serde(default = "accept")]
    pub accept: String,

    #[serde(default = "listen_addr")]
    pub listen_addr: String,

    /// User id used by the cli when `--user` is not given
    #[serde(default = "default_user")]
    pub default_user: String,

    /// Strip tracking parameters and trailing slashes before saving
    #[serde(default = "normalize_urls")]
    pub normalize_urls: bool,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

fn fetch_timeout_secs() -> u64 {
    FETCH_TIMEOUT_DEFAULT.as_secs()
}

fn user_agent() -> String {
    USER_AGENT_DEFAULT.to_string()
}

fn accept() -> String {
    ACCEPT_DEFAULT.to_string()
}

fn listen_addr() -> String {
    LISTEN_ADDR_DEFAULT.to_string()
}

fn default_user() -> String {
    DEFAULT_USER.to_string()
}

fn normalize_urls() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: fetch_timeout_secs(),
            user_agent: user_agent(),
            accept: accept(),
            listen_addr: listen_addr(),
            default_user: default_user(),
            normalize_urls: normalize_urls(),
            base_path: PathBuf::new(),
        }
    }
}

/// `READLATER_BASE_PATH`, or `~/.local/share/readlater`
pub fn base_path() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var("READLATER_BASE_PATH") {
        return Ok(PathBuf::from(path));
    }

    let home = my_home()
        .context("could not determine home directory")?
        .context("home directory path is empty")?;

    Ok(home.join(".local/share/readlater"))
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        if self.fetch_timeout_secs == 0 {
            bail!("fetch_timeout_secs must be greater than 0");
        }
        if self.user_agent.trim().is_empty() {
            bail!("user_agent must not be empty");
        }
        if self.default_user.trim().is_empty() {
            bail!("default_user must not be empty");
        }
        Ok(())
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(base_path()?)
    }

    /// Read `config.yaml` from `base_path`, writing the defaults first if it
    /// does not exist yet.
    pub fn load_with(base_path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)
            .with_context(|| format!("failed to create {}", base_path.display()))?;

        let path = base_path.join(CONFIG_FILE);
        if !path.exists() {
            log::info!("writing default config to {}", path.display());
            std::fs::write(&path, serde_yml::to_string(&Self::default())?)?;
        }

        let config_str = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;
        config.base_path = base_path;

        config.validate()?;

        // resave in case new fields were added
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_str = serde_yml::to_string(&self)?;
        std::fs::write(self.base_path.join(CONFIG_FILE), config_str)?;
        Ok(())
    }

    pub fn links_path(&self) -> PathBuf {
        self.base_path.join(LINKS_FILE)
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            user_agent: self.user_agent.clone(),
            accept: self.accept.clone(),
        }
    }
}
