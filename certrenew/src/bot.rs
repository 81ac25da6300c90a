use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::{
    cert_dir::CertDir,
    reload::Reloader,
    zerossl_client::{ZeroSslClient, ZEROSSL_API_URL},
};

/// A domain to renew and the directory its files are written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Fully qualified domain name
    pub domain: String,
    /// Directory receiving certificate.crt, ca_bundle.crt and fullchain.pem
    pub cert_dir: PathBuf,
}

impl DomainConfig {
    pub fn new(domain: impl Into<String>, cert_dir: impl Into<PathBuf>) -> Self {
        Self {
            domain: domain.into(),
            cert_dir: cert_dir.into(),
        }
    }
}

#[derive(Clone, Debug, bon::Builder)]
#[builder(on(String, into))]
pub struct RenewerConfig {
    #[builder(default = ZEROSSL_API_URL.to_string())]
    api_url: String,
    api_key: String,
    email: String,
    domains: Vec<DomainConfig>,
    reloader: Reloader,
    #[builder(default = Duration::from_secs(60 * 24 * 60 * 60))]
    renew_interval: Duration,
}

impl RenewerConfig {
    pub fn build_renewer(&self) -> Result<CertRenewer> {
        CertRenewer::build(self.clone())
    }

    fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            bail!("api key is empty");
        }
        if self.renew_interval.is_zero() {
            bail!("renew interval is zero");
        }
        for domain in &self.domains {
            if domain.domain.is_empty() {
                bail!("domain name is empty");
            }
            if domain.cert_dir.as_os_str().is_empty() {
                bail!("certificate directory of {} is empty", domain.domain);
            }
        }
        Ok(())
    }
}

pub struct CertRenewer {
    client: ZeroSslClient,
    config: RenewerConfig,
}

impl CertRenewer {
    /// Build a new `CertRenewer` from a `RenewerConfig`.
    pub fn build(config: RenewerConfig) -> Result<Self> {
        config.validate().context("invalid renewer config")?;
        let client = ZeroSslClient::new(&config.api_url, &config.api_key);
        Ok(Self { client, config })
    }

    pub fn renew_interval(&self) -> Duration {
        self.config.renew_interval
    }

    /// Run a renewal every `renew_interval`, forever.
    ///
    /// A failed run is logged and retried at the next interval.
    pub async fn run(&self) {
        loop {
            if let Err(e) = self.renew_all().await {
                error!("failed to renew certificates: {e:?}");
            }
            info!("next renewal in {:?}", self.config.renew_interval);
            sleep(self.config.renew_interval).await;
        }
    }

    /// Renew every configured domain in order, then reload the server once.
    ///
    /// The first failure aborts the run: remaining domains are skipped, files
    /// already written stay in place and the server is not reloaded.
    pub async fn renew_all(&self) -> Result<()> {
        if self.config.domains.is_empty() {
            warn!("no domains configured");
        }
        for domain in &self.config.domains {
            self.renew_domain(domain)
                .await
                .with_context(|| format!("failed to renew certificate for {}", domain.domain))?;
        }
        self.config
            .reloader
            .reload()
            .await
            .context("failed to reload server")?;
        info!("renewed {} certificate(s)", self.config.domains.len());
        Ok(())
    }

    /// Renew the certificate of a single domain without reloading the server.
    pub async fn renew_domain(&self, domain: &DomainConfig) -> Result<()> {
        let cert_dir = CertDir::new(&domain.cert_dir);

        info!("creating new certificate order for domain: {}", domain.domain);
        let order = self
            .client
            .create_order(&domain.domain, &self.config.email)
            .await
            .context("failed to create order")?;
        info!("order created with ID: {}", order.order_id);

        info!("fetching order details for order ID: {}", order.order_id);
        let details = self
            .client
            .get_order_details(&order.order_id)
            .await
            .context("failed to get order details")?;
        info!("certificate URL: {}", details.certificate_url);
        info!("CA bundle URL: {}", details.ca_bundle_url);

        cert_dir.create()?;

        info!("downloading certificate for domain: {}", domain.domain);
        self.client
            .download(&details.certificate_url, cert_dir.cert_path())
            .await
            .context("failed to download certificate")?;
        info!("certificate downloaded to {}", cert_dir.cert_path().display());

        info!("downloading CA bundle for domain: {}", domain.domain);
        self.client
            .download(&details.ca_bundle_url, cert_dir.ca_bundle_path())
            .await
            .context("failed to download CA bundle")?;
        info!("CA bundle downloaded to {}", cert_dir.ca_bundle_path().display());

        info!(
            "combining certificate and CA bundle into fullchain.pem for domain: {}",
            domain.domain
        );
        cert_dir
            .assemble_fullchain()
            .context("failed to assemble full chain")?;
        info!("fullchain.pem created at {}", cert_dir.fullchain_path().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests;
