use anyhow::{Context, Result};
use fs_err as fs;
use std::path::{Path, PathBuf};

/// Output directory of a single domain.
#[derive(Debug, Clone)]
pub struct CertDir {
    cert_dir: PathBuf,
}

impl CertDir {
    pub fn new(cert_dir: impl AsRef<Path>) -> Self {
        Self {
            cert_dir: cert_dir.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.cert_dir
    }

    pub fn cert_path(&self) -> PathBuf {
        self.cert_dir.join("certificate.crt")
    }

    pub fn ca_bundle_path(&self) -> PathBuf {
        self.cert_dir.join("ca_bundle.crt")
    }

    pub fn fullchain_path(&self) -> PathBuf {
        self.cert_dir.join("fullchain.pem")
    }

    /// Create the directory and its missing parents.
    pub fn create(&self) -> Result<()> {
        fs::create_dir_all(&self.cert_dir).context("failed to create certificate directory")
    }

    /// Write `fullchain.pem` from the downloaded certificate and CA bundle.
    pub fn assemble_fullchain(&self) -> Result<()> {
        combine_certificates(
            self.cert_path(),
            self.ca_bundle_path(),
            self.fullchain_path(),
        )
    }
}

/// Write the bytes of `cert_path` immediately followed by the bytes of
/// `ca_bundle_path` into `fullchain_path`. Nothing is inserted between them.
pub fn combine_certificates(
    cert_path: impl AsRef<Path>,
    ca_bundle_path: impl AsRef<Path>,
    fullchain_path: impl AsRef<Path>,
) -> Result<()> {
    let mut fullchain = fs::read(cert_path.as_ref())?;
    fullchain.extend(fs::read(ca_bundle_path.as_ref())?);
    safe_write::safe_write(fullchain_path.as_ref(), &fullchain)
        .with_context(|| format!("failed to write {}", fullchain_path.as_ref().display()))?;
    Ok(())
}
