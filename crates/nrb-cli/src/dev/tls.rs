//! HTTPS material for the dev server.
//!
//! Certificates are never generated here; a PEM certificate chain and its
//! private key are loaded from the configured paths.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::rustls;
use tokio_rustls::TlsAcceptor;

use crate::error::{CliError, Result};

/// Build a TLS acceptor from PEM files.
///
/// # Errors
///
/// `CliError::Tls` when a file is unreadable, holds no certificate or key, or the
/// key does not match the certificate.
pub fn load_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor> {
    let mut cert_reader = BufReader::new(open(cert_path)?);
    let certs: Vec<_> = rustls_pemfile::certs(&mut cert_reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| CliError::Tls(format!("{}: {}", cert_path.display(), e)))?;
    if certs.is_empty() {
        return Err(CliError::Tls(format!(
            "{}: no certificates found",
            cert_path.display()
        )));
    }

    let mut key_reader = BufReader::new(open(key_path)?);
    let key = rustls_pemfile::private_key(&mut key_reader)
        .map_err(|e| CliError::Tls(format!("{}: {}", key_path.display(), e)))?
        .ok_or_else(|| CliError::Tls(format!("{}: no private key found", key_path.display())))?;

    let mut config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| CliError::Tls(e.to_string()))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| CliError::Tls(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_files_are_tls_errors() {
        let dir = TempDir::new().unwrap();
        let err = load_acceptor(&dir.path().join("cert.pem"), &dir.path().join("key.pem"))
            .err()
            .unwrap();
        assert!(matches!(err, CliError::Tls(_)));
        assert!(err.to_string().contains("cert.pem"));
    }

    #[test]
    fn test_pem_without_certificates_is_rejected() {
        let dir = TempDir::new().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        fs::write(&cert, "not a certificate").unwrap();
        fs::write(&key, "not a key").unwrap();

        let err = load_acceptor(&cert, &key).err().unwrap();
        assert!(err.to_string().contains("no certificates found"));
    }
}
