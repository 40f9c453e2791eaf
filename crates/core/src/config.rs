use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use url::Url;

pub const HOST_ENV: &str = "DATABRICKS_HOST";
pub const TOKEN_ENV: &str = "DATABRICKS_TOKEN";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub databricks: DatabricksConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabricksConfig {
    /// Workspace URL, e.g. `https://dbc-1234.cloud.databricks.com`
    pub host: Url,
    /// Personal access token or OAuth token
    pub token: String,
    /// Per-request timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Read the YAML config file if given, then apply `DATABRICKS_HOST` and
    /// `DATABRICKS_TOKEN`. Without a file, both variables must be set.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    fn load_with(path: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = env(HOST_ENV)
            .map(|v| Url::parse(&v).with_context(|| format!("Invalid {HOST_ENV} '{v}'")))
            .transpose()?;
        let token = env(TOKEN_ENV);
        let mut config = match path {
            Some(path) => {
                let file = BufReader::new(
                    File::open(path)
                        .with_context(|| format!("Failed to open {}", path.display()))?,
                );
                serde_yaml::from_reader::<_, Config>(file)
                    .with_context(|| format!("Failed to parse {}", path.display()))?
            }
            None => Config {
                databricks: DatabricksConfig {
                    host: host.clone().ok_or_else(|| {
                        anyhow!("No config file found and {HOST_ENV} is not set")
                    })?,
                    token: token.clone().ok_or_else(|| {
                        anyhow!("No config file found and {TOKEN_ENV} is not set")
                    })?,
                    timeout_secs: None,
                },
            },
        };
        if let Some(host) = host {
            config.databricks.host = host;
        }
        if let Some(token) = token {
            config.databricks.token = token;
        }
        Ok(config)
    }
}
