//! Transport selection and TLS setup for roomchat.
//!
//! The URL scheme picks the socket flavour:
//! - `ws://` → plain TCP WebSocket
//! - `wss://` → WebSocket over rustls, honouring the configured [`TlsPolicy`]

pub mod websocket;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use roomchat_core::error::{ChatError, ChatResult};

/// Socket flavour, inferred from the connection URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Plain,
    Tls,
}

static TLS12_AND_UP: &[&rustls::SupportedProtocolVersion] =
    &[&rustls::version::TLS13, &rustls::version::TLS12];
static TLS13_ONLY: &[&rustls::SupportedProtocolVersion] = &[&rustls::version::TLS13];

/// Minimum TLS protocol version accepted for `wss://` connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TlsPolicy {
    /// TLS 1.2 or 1.3.
    #[default]
    #[serde(rename = "1.2")]
    Tls12,
    /// TLS 1.3 only.
    #[serde(rename = "1.3")]
    Tls13,
}

impl TlsPolicy {
    pub fn protocol_versions(self) -> &'static [&'static rustls::SupportedProtocolVersion] {
        match self {
            Self::Tls12 => TLS12_AND_UP,
            Self::Tls13 => TLS13_ONLY,
        }
    }
}

/// Determine the socket flavour from a URL string.
pub fn detect_scheme(url: &str) -> ChatResult<Scheme> {
    let lower = url.trim().to_lowercase();
    if lower.starts_with("wss://") {
        Ok(Scheme::Tls)
    } else if lower.starts_with("ws://") {
        Ok(Scheme::Plain)
    } else {
        Err(ChatError::ConnectFailure(format!(
            "unsupported URL scheme: {url} (expected ws:// or wss://)"
        )))
    }
}

/// Build a rustls client config trusting the webpki root set, restricted to
/// the versions `policy` allows.
pub fn client_tls_config(policy: TlsPolicy) -> ChatResult<Arc<rustls::ClientConfig>> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(policy.protocol_versions())
        .map_err(|e| ChatError::ConnectFailure(format!("TLS config error: {e}")))?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_plain_and_tls() {
        assert_eq!(detect_scheme("ws://localhost:4000").unwrap(), Scheme::Plain);
        assert_eq!(detect_scheme("wss://example.com/chat").unwrap(), Scheme::Tls);
        assert_eq!(detect_scheme("WSS://EXAMPLE.COM").unwrap(), Scheme::Tls);
    }

    #[test]
    fn detect_unknown() {
        assert!(matches!(
            detect_scheme("https://example.com"),
            Err(ChatError::ConnectFailure(_))
        ));
        assert!(detect_scheme("").is_err());
    }

    #[test]
    fn tls12_policy_allows_both_versions() {
        let versions = TlsPolicy::Tls12.protocol_versions();
        assert_eq!(versions.len(), 2);
        assert!(versions.iter().all(|v| v.version != rustls::ProtocolVersion::TLSv1_1));
        assert_eq!(TlsPolicy::Tls13.protocol_versions().len(), 1);
    }

    #[test]
    fn tls_config_builds_for_each_policy() {
        for policy in [TlsPolicy::Tls12, TlsPolicy::Tls13] {
            let config = client_tls_config(policy).unwrap();
            assert!(config.alpn_protocols.is_empty());
        }
    }
}
