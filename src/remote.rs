//! Utility functions for dealing with remote clusters.
//!
//! This module offers the small surface we need from a cluster (connecting,
//! listing indices and checking liveness), along with the implementation of
//! that surface backed by the Elasticsearch client.
use async_trait::async_trait;
use elasticsearch::auth::{ClientCertificate, Credentials};
use elasticsearch::cert::{Certificate, CertificateValidation};
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use elasticsearch::indices::IndicesGetAliasParts;
use elasticsearch::Elasticsearch;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::options::Options;

/// Directory containing the TLS materials for a cluster.
pub const CERTS_DIR: &str = "/certs";

/// Certificate authority used to validate the cluster.
pub const CA_CERT: &str = "ca.pem";

/// Certificate presented to the cluster by the client.
pub const CLIENT_CERT: &str = "client.pem";

/// Key belonging to the client certificate.
pub const CLIENT_KEY: &str = "client-key.pem";

/// Environment variable containing the cluster username.
pub const USERNAME_ENV: &str = "USERNAME";

/// Environment variable containing the cluster password.
pub const PASSWORD_ENV: &str = "PASSWORD";

/// Timeout applied to every request sent to a cluster.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors raised when talking to a cluster.
///
/// This is a closed set so that retry logic can decide what is worth
/// trying again; see `is_transient` for the split.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("invalid cluster host: {0}")]
    Host(String),

    #[error("unable to build cluster client: {0}")]
    Build(String),

    #[error("cluster is not responding")]
    Unreachable,

    #[error("cluster request failed: {0}")]
    Request(#[from] elasticsearch::Error),

    #[error("unexpected cluster response: {0}")]
    Response(String),
}

impl ClusterError {
    /// Whether the error may resolve itself if tried again later.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClusterError::Build(_) | ClusterError::Unreachable)
    }
}

/// A connected cluster.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Lists the names of all indices known to the cluster.
    async fn list_indices(&self) -> Result<Vec<String>, ClusterError>;

    /// Checks whether the cluster is alive and answering requests.
    async fn check_liveness(&self) -> Result<(), ClusterError>;
}

/// Factory for cluster connections.
#[async_trait]
pub trait Connector: Send + Sync {
    type Cluster: Cluster;

    /// Attempts to construct a new connection to the cluster.
    async fn connect(&self) -> Result<Self::Cluster, ClusterError>;
}

#[async_trait]
impl Cluster for Elasticsearch {
    async fn list_indices(&self) -> Result<Vec<String>, ClusterError> {
        // every index shows up in the alias listing, aliased or not
        let response = self
            .indices()
            .get_alias(IndicesGetAliasParts::None)
            .send()
            .await?
            .error_for_status_code()?;

        // parse the response body
        let body = response.json::<Value>().await?;

        // keys of the listing are the index names
        let aliases = body
            .as_object()
            .ok_or_else(|| ClusterError::Response("alias listing is not an object".to_owned()))?;

        Ok(aliases.keys().cloned().collect())
    }

    async fn check_liveness(&self) -> Result<(), ClusterError> {
        match self.ping().send().await {
            Ok(response) if response.status_code().is_success() => Ok(()),
            Ok(response) => {
                tracing::debug!("Ping returned status {}", response.status_code());
                Err(ClusterError::Unreachable)
            }
            Err(e) => {
                tracing::debug!("Ping failed: {}", e);
                Err(ClusterError::Unreachable)
            }
        }
    }
}

/// Connector creating Elasticsearch clients.
#[derive(Debug)]
pub struct ElasticConnector {
    url: Url,
    certs: Option<PathBuf>,
}

impl ElasticConnector {
    /// Creates a connector based on the provided options.
    ///
    /// TLS is enabled when a certificate authority can be found inside the
    /// certificates directory, and basic credentials are attached when both
    /// of the username and password variables are set in the environment.
    pub fn new(options: &Options) -> Result<Self, ClusterError> {
        let certs = Path::new(CERTS_DIR);
        let certs = if certs.join(CA_CERT).exists() {
            Some(certs.to_path_buf())
        } else {
            None
        };

        let mut url = parse_host(&options.host, options.port, certs.is_some())?;

        apply_credentials(
            &mut url,
            env::var(USERNAME_ENV).ok(),
            env::var(PASSWORD_ENV).ok(),
        )?;

        Ok(Self { url, certs })
    }
}

/// Attaches basic credentials to a cluster location.
///
/// Credentials are only attached when both parts are present; the client
/// sends them as basic authentication on every request.
pub fn apply_credentials(
    url: &mut Url,
    user: Option<String>,
    pass: Option<String>,
) -> Result<(), ClusterError> {
    let (user, pass) = match (user, pass) {
        (Some(user), Some(pass)) => (user, pass),
        _ => return Ok(()),
    };

    let target = url.to_string();
    let rejected = |_| ClusterError::Host(format!("{} does not accept credentials", target));

    url.set_username(&user).map_err(rejected)?;
    url.set_password(Some(&pass)).map_err(rejected)?;

    Ok(())
}

#[async_trait]
impl Connector for ElasticConnector {
    type Cluster = Elasticsearch;

    async fn connect(&self) -> Result<Elasticsearch, ClusterError> {
        create_client(&self.url, self.certs.as_deref())
    }
}

/// Creates a new client based on the provided cluster location.
///
/// When a certificates directory is provided, the cluster is validated against
/// the authority it contains and the client certificate is presented.
pub fn create_client(url: &Url, certs: Option<&Path>) -> Result<Elasticsearch, ClusterError> {
    let pool = SingleNodeConnectionPool::new(url.clone());
    let mut builder = TransportBuilder::new(pool).timeout(REQUEST_TIMEOUT);

    if let Some(dir) = certs {
        let authority = read_pem(&dir.join(CA_CERT))?;
        let authority =
            Certificate::from_pem(&authority).map_err(|e| ClusterError::Build(e.to_string()))?;

        // the client identity is the certificate followed by its key
        let mut identity = read_pem(&dir.join(CLIENT_CERT))?;
        identity.extend(read_pem(&dir.join(CLIENT_KEY))?);

        builder = builder
            .cert_validation(CertificateValidation::Full(authority))
            .auth(Credentials::Certificate(ClientCertificate::Pem(identity)));
    }

    let transport = builder
        .build()
        .map_err(|e| ClusterError::Build(e.to_string()))?;

    Ok(Elasticsearch::new(transport))
}

/// Reads a PEM file from the certificates directory.
fn read_pem(path: &Path) -> Result<Vec<u8>, ClusterError> {
    fs::read(path).map_err(|e| ClusterError::Build(format!("{}: {}", path.display(), e)))
}

/// Attempts to parse a cluster location out of the host flag.
///
/// Hosts are usually just a service name, in which case a URL is built from
/// the port and the scheme implied by `tls`. A host which already includes an
/// HTTP(S) scheme is used as provided.
pub fn parse_host(host: &str, port: u16, tls: bool) -> Result<Url, ClusterError> {
    let target = if host.contains("://") {
        host.to_owned()
    } else {
        let scheme = if tls { "https" } else { "http" };
        format!("{}://{}:{}", scheme, host, port)
    };

    // attempt to parse the resource
    let url = Url::parse(&target).map_err(|e| ClusterError::Host(format!("{}: {}", host, e)))?;

    // only http(s) locations with a host can be reached by the client
    if !url.has_host() || !url.scheme().starts_with("http") {
        return Err(ClusterError::Host(host.to_owned()));
    }

    Ok(url)
}
