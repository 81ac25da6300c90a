//! A certificate renewal client for the ZeroSSL certificate authority.
//!
//! This library renews TLS certificates through the ZeroSSL REST API and then
//! reloads the web server that serves them.
//!
//! # Features
//!
//! - Order submission and order detail retrieval against the ZeroSSL API
//! - Download of the leaf certificate and the CA bundle
//! - In-process assembly of `fullchain.pem`
//! - Server reload through `docker exec` or an arbitrary shell hook
//!
//! # Usage
//!
//! Build a [`RenewerConfig`] once at startup, turn it into a [`CertRenewer`]
//! and call [`CertRenewer::renew_all`]. Every configured domain is renewed in
//! order and the server is reloaded once at the end. The first error aborts
//! the run and the reload is skipped.
//!
//! ```no_run
//! use certrenew::{DomainConfig, Reloader, RenewerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RenewerConfig::builder()
//!         .api_key("your_zerossl_api_key")
//!         .email("admin@example.com")
//!         .domains(vec![DomainConfig::new("example.com", "/etc/nginx/certs/example_com")])
//!         .reloader(Reloader::docker("nginx"))
//!         .build();
//!
//!     let renewer = config.build_renewer()?;
//!     renewer.renew_all().await?;
//!     Ok(())
//! }
//! ```
pub use bot::{CertRenewer, DomainConfig, RenewerConfig};
pub use cert_dir::{combine_certificates, CertDir};
pub use reload::{DockerReload, HookReload, Reloader};
pub use zerossl_client::{OrderDetails, OrderResponse, ZeroSslClient, ZEROSSL_API_URL};

mod bot;
mod cert_dir;
mod reload;
mod zerossl_client;
