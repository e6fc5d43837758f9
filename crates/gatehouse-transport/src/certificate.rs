//! TLS certificate resolution and self-signed provisioning.
//!
//! Certificates live in a local store directory, one sub-directory per
//! subject holding `cert.pem` and `key.pem`. [`CertificateProvider::get`]
//! returns the stored certificate for its subject, provisioning a fresh
//! self-signed one first when the store has none.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::server::TlsConfig;

const CERT_FILE: &str = "cert.pem";
const KEY_FILE: &str = "key.pem";

#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    #[error("certificate 'CN={0}' not found in store")]
    NotFound(String),

    #[error("failed to generate certificate for 'CN={subject}': {source}")]
    Generate {
        subject: String,
        #[source]
        source: rcgen::Error,
    },

    #[error("certificate store error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A certificate resolved from the store.
#[derive(Debug, Clone)]
pub struct Certificate {
    pub subject: String,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub cert_pem: String,
    /// `"sha256:<hex>"` over the DER encoding
    pub fingerprint: String,
}

impl Certificate {
    /// TLS settings pointing at this certificate's PEM files.
    pub fn tls_config(&self) -> TlsConfig {
        TlsConfig {
            cert_path: self.cert_path.clone(),
            key_path: self.key_path.clone(),
        }
    }
}

/// Resolves the certificate for one subject from a store directory.
#[derive(Debug, Clone)]
pub struct CertificateProvider {
    subject: String,
    store_dir: PathBuf,
}

impl CertificateProvider {
    pub fn new(subject: impl Into<String>, store_dir: impl Into<PathBuf>) -> Self {
        Self {
            subject: subject.into(),
            store_dir: store_dir.into(),
        }
    }

    /// `~/.gatehouse/certs`
    pub fn default_store_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".gatehouse/certs")
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Stored certificate, else a freshly provisioned one, else `NotFound`.
    pub fn get(&self) -> Result<Certificate, CertificateError> {
        if let Some(cert) = self.from_store()? {
            return Ok(cert);
        }

        if let Err(e) = self.provision() {
            warn!("Certificate provisioning failed: {e}");
        }

        self.from_store()?
            .ok_or_else(|| CertificateError::NotFound(self.subject.clone()))
    }

    /// Look the subject up in the store. `Ok(None)` when it is not there.
    pub fn from_store(&self) -> Result<Option<Certificate>, CertificateError> {
        let dir = self.subject_dir();
        let cert_path = dir.join(CERT_FILE);
        let key_path = dir.join(KEY_FILE);

        if !cert_path.is_file() || !key_path.is_file() {
            return Ok(None);
        }

        let cert_pem = std::fs::read_to_string(&cert_path).map_err(|source| CertificateError::Io {
            path: cert_path.clone(),
            source,
        })?;
        let fingerprint = fingerprint_from_pem(&cert_pem).unwrap_or_default();

        Ok(Some(Certificate {
            subject: self.subject.clone(),
            cert_path,
            key_path,
            cert_pem,
            fingerprint,
        }))
    }

    /// Generate a self-signed ECDSA P-256 certificate for the subject and
    /// write it to the store.
    pub fn provision(&self) -> Result<(), CertificateError> {
        let generate = |source| CertificateError::Generate {
            subject: self.subject.clone(),
            source,
        };

        // SANs: localhost, 127.0.0.1, ::1, and the machine hostname
        let mut sans = vec![
            "localhost".to_string(),
            "127.0.0.1".to_string(),
            "::1".to_string(),
        ];
        if let Ok(hostname) = hostname::get() {
            let hostname = hostname.to_string_lossy().to_string();
            if !sans.contains(&hostname) {
                sans.push(hostname);
            }
        }

        let mut subject_alt_names = Vec::with_capacity(sans.len());
        for san in sans {
            let san = match san.parse::<std::net::IpAddr>() {
                Ok(ip) => rcgen::SanType::IpAddress(ip),
                Err(_) => rcgen::SanType::DnsName(san.try_into().map_err(generate)?),
            };
            subject_alt_names.push(san);
        }

        let mut params = rcgen::CertificateParams::new(Vec::<String>::new()).map_err(generate)?;
        params.distinguished_name = rcgen::DistinguishedName::new();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, self.subject.as_str());
        params.subject_alt_names = subject_alt_names;

        let key_pair = rcgen::KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256).map_err(generate)?;
        let cert = params.self_signed(&key_pair).map_err(generate)?;

        let dir = self.subject_dir();
        std::fs::create_dir_all(&dir).map_err(|source| CertificateError::Io {
            path: dir.clone(),
            source,
        })?;

        let key_path = dir.join(KEY_FILE);
        write_file(&key_path, &key_pair.serialize_pem())?;

        // Restrict key permissions (owner-only read/write)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600));
        }

        // Written last: the certificate file marks the entry as complete.
        write_file(&dir.join(CERT_FILE), &cert.pem())?;

        info!(subject = %self.subject, store = %dir.display(), "Provisioned self-signed certificate");
        Ok(())
    }

    fn subject_dir(&self) -> PathBuf {
        self.store_dir.join(store_key(&self.subject))
    }
}

/// File-system safe directory name for a subject.
fn store_key(subject: &str) -> String {
    subject
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect()
}

fn write_file(path: &Path, contents: &str) -> Result<(), CertificateError> {
    std::fs::write(path, contents).map_err(|source| CertificateError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Compute the SHA-256 fingerprint of the first certificate in a PEM document.
/// Returns `"sha256:<hex>"` or None if parsing fails.
pub fn fingerprint_from_pem(pem: &str) -> Option<String> {
    use base64::Engine;
    use sha2::{Digest, Sha256};

    let b64: String = pem
        .lines()
        .skip_while(|l| !l.starts_with("-----BEGIN"))
        .skip(1)
        .take_while(|l| !l.starts_with("-----END"))
        .map(str::trim)
        .collect();
    if b64.is_empty() {
        return None;
    }
    let der = base64::engine::general_purpose::STANDARD.decode(&b64).ok()?;
    Some(format!("sha256:{}", hex::encode(Sha256::digest(&der))))
}
