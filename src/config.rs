//! Service configuration.
//!
//! Values come from the process environment, after `main` has loaded any
//! `.env` file. Only the API key is required.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::openrouter::DEFAULT_MODEL;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_FORMS_DIR: &str = "forms";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub openrouter_api_key: String,
    pub model: String,
    pub bind_addr: SocketAddr,
    /// Directory holding the blank forms and the sample W-2 image.
    pub forms_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let openrouter_api_key =
            get("OPENROUTER_API_KEY").context("OPENROUTER_API_KEY environment variable not set")?;

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDR is not a valid socket address")?;

        let max_upload_bytes = match get("MAX_UPLOAD_BYTES") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .with_context(|| format!("MAX_UPLOAD_BYTES is not a byte count: {}", v))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            openrouter_api_key,
            model: get("W2_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            bind_addr,
            forms_dir: PathBuf::from(get("FORMS_DIR").unwrap_or_else(|| DEFAULT_FORMS_DIR.to_string())),
            max_upload_bytes,
        })
    }
}
