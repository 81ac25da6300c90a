use std::path::Path;

use anyhow::{bail, Context, Result};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

pub const ZEROSSL_API_URL: &str = "https://api.zerossl.com/acme";

/// A client for the ZeroSSL REST API.
///
/// Every API request carries the access key as the `access_key` query parameter.
#[derive(Debug, Clone)]
pub struct ZeroSslClient {
    api_url: String,
    api_key: String,
    http: Client,
}

/// Response of a certificate order submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OrderResponse {
    /// Identifier of the created order
    pub order_id: String,
}

/// Download locations of an issued certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDetails {
    /// URL of the leaf certificate
    pub certificate_url: String,
    /// URL of the intermediate CA bundle
    pub ca_bundle_url: String,
}

impl ZeroSslClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let api_url: String = api_url.into();
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http: Client::new(),
        }
    }

    /// Submit a new certificate order for a single domain.
    ///
    /// The domain is used both as the common name and as the only subject
    /// alternative name.
    pub async fn create_order(&self, domain: &str, email: &str) -> Result<OrderResponse> {
        let url = format!("{}/certificates", self.api_url);
        debug!("creating order at {url}");
        let response = self
            .http
            .post(&url)
            .query(&[("access_key", &self.api_key)])
            .json(&json!({
                "common_name": domain,
                "subject_alt_names": [domain],
                "email": email,
            }))
            .send()
            .await
            .context("failed to send order request")?;
        let response = check_status(response, "API request").await?;
        response.json().await.context("failed to parse order response")
    }

    /// Fetch the download locations of an order.
    pub async fn get_order_details(&self, order_id: &str) -> Result<OrderDetails> {
        let url = format!("{}/orders/{order_id}", self.api_url);
        debug!("fetching order details at {url}");
        let response = self
            .http
            .get(&url)
            .query(&[("access_key", &self.api_key)])
            .send()
            .await
            .context("failed to send order details request")?;
        let response = check_status(response, "API request").await?;

        #[derive(Deserialize)]
        struct Details {
            #[serde(default)]
            certificates: Vec<CertificateEntry>,
            ca_bundle_url: String,
        }

        #[derive(Deserialize)]
        struct CertificateEntry {
            url: String,
        }

        let details: Details = response
            .json()
            .await
            .context("failed to parse order details")?;
        let certificate = details
            .certificates
            .into_iter()
            .next()
            .with_context(|| format!("order {order_id} has no certificate"))?;
        Ok(OrderDetails {
            certificate_url: certificate.url,
            ca_bundle_url: details.ca_bundle_url,
        })
    }

    /// Download `url` into `output_path`, replacing any existing file.
    ///
    /// The file is only written once the whole body has been received with a
    /// success status. The write goes through a temporary file and a rename, so
    /// a failed download never leaves a partial file behind.
    pub async fn download(&self, url: &str, output_path: impl AsRef<Path>) -> Result<()> {
        let output_path = output_path.as_ref();
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to request {url}"))?;
        let response = check_status(response, "download").await?;
        let body = response
            .bytes()
            .await
            .context("failed to read download body")?;
        safe_write::safe_write(output_path, &body)
            .with_context(|| format!("failed to write {}", output_path.display()))?;
        debug!("wrote {} bytes to {}", body.len(), output_path.display());
        Ok(())
    }
}

async fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .with_context(|| format!("{what} failed with status code {}", status.as_u16()))?;
        bail!("{what} failed with status code {}: {body}", status.as_u16());
    }
    Ok(response)
}
