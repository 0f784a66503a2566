//! Raw byte-stream setup — plain TCP or TLS-over-TCP, handed back as boxed
//! trait objects so the actor never needs to know which one it got.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;

use vst_core::config::TlsConfig;
use vst_core::error::{DriverError, DriverResult};
use vst_core::model::HostDescription;

pub type BoxedRead = Box<dyn AsyncRead + Unpin + Send>;
pub type BoxedWrite = Box<dyn AsyncWrite + Unpin + Send>;

/// Opens a TCP connection to `host`, wrapping it in TLS when configured.
pub async fn connect(host: &HostDescription, tls: &TlsConfig) -> DriverResult<(BoxedRead, BoxedWrite)> {
    let tcp = TcpStream::connect((host.host.as_str(), host.port))
        .await
        .map_err(|e| DriverError::transport(format!("connect to {host} failed: {e}")))?;
    tcp.set_nodelay(true).ok();

    if !tls.use_ssl {
        let (read, write) = tokio::io::split(tcp);
        return Ok((Box::new(read), Box::new(write)));
    }

    let connector = build_connector(tls)?;
    let server_name = ServerName::try_from(host.host.clone())
        .map_err(|e| DriverError::transport(format!("invalid TLS server name {}: {e}", host.host)))?;
    let tls_stream = connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| DriverError::transport(format!("TLS handshake with {host} failed: {e}")))?;
    let (read, write) = tokio::io::split(tls_stream);
    Ok((Box::new(read), Box::new(write)))
}

fn build_connector(tls: &TlsConfig) -> DriverResult<TlsConnector> {
    let mut roots = tokio_rustls::rustls::RootCertStore::empty();
    for cert in rustls_native_certs::load_native_certs()
        .map_err(|e| DriverError::transport(format!("failed to load native root certificates: {e}")))?
    {
        // A handful of root stores ship expired or malformed entries; skip
        // rather than fail the whole connector.
        let _ = roots.add(cert);
    }

    if let Some(ca_file) = &tls.ca_file {
        let file = File::open(ca_file)
            .map_err(|e| DriverError::transport(format!("failed to open {}: {e}", ca_file.display())))?;
        let mut reader = BufReader::new(file);
        for cert in rustls_pemfile::certs(&mut reader) {
            let cert = cert.map_err(|e| {
                DriverError::transport(format!("failed to parse {}: {e}", ca_file.display()))
            })?;
            roots
                .add(cert)
                .map_err(|e| DriverError::transport(format!("invalid certificate in {}: {e}", ca_file.display())))?;
        }
    }

    let config = tokio_rustls::rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}
