use std::{path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use certrenew::{DomainConfig, Reloader, RenewerConfig, ZEROSSL_API_URL};
use documented::DocumentedFields;
use figment::Figment;
use load_config::load_config;
use serde::{Deserialize, Serialize};
use toml_edit::ser::to_document;

pub const DEFAULT_CONFIG: &str = include_str!("../certrenew.toml");

/// Keys overridable from the environment with values that must stay strings.
const STRING_ENV_KEYS: &[&str] = &["api_url", "api_key", "email"];

pub fn load_config_figment(config_file: Option<&Path>) -> Figment {
    load_config("certrenew", DEFAULT_CONFIG, config_file, STRING_ENV_KEYS)
}

/// Configuration file of the certrenew binary.
#[derive(Debug, Deserialize, Serialize, DocumentedFields)]
pub struct Config {
    /// ZeroSSL API base URL
    pub api_url: String,
    /// ZeroSSL API access key
    pub api_key: String,
    /// Account email sent with every certificate order
    pub email: String,
    /// Number of days between two renewals when running periodically
    pub renew_interval_days: u64,
    /// How to reload the web server once all certificates are renewed.
    ///
    /// Either `{ docker = { container = "...", command = ["nginx", "-s", "reload"] } }`
    /// or `{ hook = { command = "..." } }`.
    pub reload: Reloader,
    /// Domains to renew, each with the directory its certificate files are written to
    pub domains: Vec<DomainConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: ZEROSSL_API_URL.into(),
            api_key: "".into(),
            email: "admin@example.com".into(),
            renew_interval_days: 60,
            reload: Reloader::docker("nginx"),
            domains: vec![DomainConfig::new(
                "example.com",
                "/etc/nginx/certs/example_com",
            )],
        }
    }
}

impl Config {
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        load_config_figment(config_file)
            .extract()
            .context("failed to extract configuration")
    }

    pub fn to_commented_toml(&self) -> Result<String> {
        let mut doc = to_document(self)?;

        for (mut key, _value) in doc.iter_mut() {
            let Ok(docstring) = Self::get_field_docs(key.get()) else {
                continue;
            };
            let mut comment = String::new();
            for line in docstring.lines() {
                let line = if line.is_empty() {
                    String::from("#\n")
                } else {
                    format!("# {line}\n")
                };
                comment.push_str(&line);
            }
            key.leaf_decor_mut().set_prefix(comment);
        }
        Ok(doc.to_string())
    }

    pub fn to_renewer_config(self) -> Result<RenewerConfig> {
        let Some(renew_interval) = self.renew_interval_days.checked_mul(24 * 60 * 60) else {
            bail!(
                "renew_interval_days is too large: {}",
                self.renew_interval_days
            );
        };
        Ok(RenewerConfig::builder()
            .api_url(self.api_url)
            .api_key(self.api_key)
            .email(self.email)
            .domains(self.domains)
            .reloader(self.reload)
            .renew_interval(Duration::from_secs(renew_interval))
            .build())
    }
}
