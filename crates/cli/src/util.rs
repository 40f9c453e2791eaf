use std::{collections::HashSet, path::Path};

use anyhow::Result;
use mcd_jobs_core::config::Config;
use typed_path::Utf8NativePathBuf;

const DEFAULT_CONFIG: &str = "config.yml";

// For argp::FromArgs
pub fn native_path(value: &str) -> Result<Utf8NativePathBuf, String> {
    Ok(Utf8NativePathBuf::from(value))
}

/// Load the config from `path`, or from `config.yml` if it exists, falling
/// back to the environment.
pub fn load_config(path: Option<&Utf8NativePathBuf>) -> Result<Config> {
    let path = match path {
        Some(path) => Some(Path::new(path.as_str())),
        None => Some(Path::new(DEFAULT_CONFIG)).filter(|p| p.is_file()),
    };
    if let Some(path) = path {
        tracing::debug!("Reading config from {}", path.display());
    }
    Config::load(path)
}

/// Names are kept as given, so `-j ""` still restricts the run.
pub fn job_name_filter(names: Vec<String>) -> HashSet<String> { names.into_iter().collect() }
