//! Local and peer identities
//!
//! Identities are immutable values parsed from user-supplied address strings
//! such as `alice@example.com`, `sip:alice@10.0.0.5:5070` or
//! `sips:alice@example.com`. Parsing failures are construction errors and are
//! returned to the caller before anything reaches the state machine.
//!
//! ```rust
//! use rvoip_call_control::identity::{LocalIdentity, PeerIdentity};
//!
//! let me = LocalIdentity::parse("alice@example.com", "Alice", "secret").unwrap();
//! assert_eq!(me.address().to_string(), "sip:alice@example.com");
//! assert_eq!(me.address().port(), 5060);
//!
//! let peer = PeerIdentity::parse("sip:bob@10.0.0.7:5070").unwrap();
//! assert_eq!(peer.address().host(), "10.0.0.7");
//!
//! assert!(PeerIdentity::parse("not an address").is_err());
//! ```

use std::fmt;

use url::Url;

use crate::error::{CallControlError, CallControlResult};

/// URI scheme of a SIP address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Sip,
    Sips,
}

impl Scheme {
    fn as_str(&self) -> &'static str {
        match self {
            Scheme::Sip => "sip",
            Scheme::Sips => "sips",
        }
    }

    fn default_port(&self) -> u16 {
        match self {
            Scheme::Sip => 5060,
            Scheme::Sips => 5061,
        }
    }
}

/// A parsed `user@host[:port]` address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipAddress {
    scheme: Scheme,
    user: String,
    host: String,
    port: Option<u16>,
}

impl SipAddress {
    /// Parse an address, with or without a `sip:`/`sips:` prefix
    pub fn parse(input: &str) -> CallControlResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(CallControlError::invalid_address(input, "address is empty"));
        }

        let (scheme, rest) = if let Some(rest) = strip_prefix_ci(trimmed, "sips:") {
            (Scheme::Sips, rest)
        } else if let Some(rest) = strip_prefix_ci(trimmed, "sip:") {
            (Scheme::Sip, rest)
        } else {
            (Scheme::Sip, trimmed)
        };

        if !rest.contains('@') {
            return Err(CallControlError::invalid_address(input, "expected user@host"));
        }

        // The authority form lets the url crate validate user, host and port.
        let url = Url::parse(&format!("{}://{}", scheme.as_str(), rest))
            .map_err(|e| CallControlError::invalid_address(input, e.to_string()))?;

        if url.password().is_some() {
            return Err(CallControlError::invalid_address(
                input,
                "credentials are not allowed in an address",
            ));
        }
        if url.path() != "/" && !url.path().is_empty()
            || url.query().is_some()
            || url.fragment().is_some()
        {
            return Err(CallControlError::invalid_address(
                input,
                "unexpected path or parameters",
            ));
        }

        let user = url.username();
        if user.is_empty() {
            return Err(CallControlError::invalid_address(input, "missing user part"));
        }
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| CallControlError::invalid_address(input, "missing host"))?;

        Ok(Self {
            scheme,
            user: user.to_string(),
            host: host.to_string(),
            port: url.port(),
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port, falling back to the scheme's default
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.scheme.default_port())
    }
}

impl fmt::Display for SipAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.scheme.as_str(), self.user, self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    match s.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => s.get(prefix.len()..),
        _ => None,
    }
}

/// Identity of the local user: who registers and places calls
#[derive(Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    address: SipAddress,
    display_name: String,
    credential_secret: String,
}

impl LocalIdentity {
    pub fn parse(
        address: &str,
        display_name: impl Into<String>,
        credential_secret: impl Into<String>,
    ) -> CallControlResult<Self> {
        Ok(Self {
            address: SipAddress::parse(address)?,
            display_name: display_name.into().trim().to_string(),
            credential_secret: credential_secret.into(),
        })
    }

    pub fn address(&self) -> &SipAddress {
        &self.address
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn credential_secret(&self) -> &str {
        &self.credential_secret
    }
}

impl fmt::Debug for LocalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalIdentity")
            .field("address", &self.address.to_string())
            .field("display_name", &self.display_name)
            .field("credential_secret", &"<redacted>")
            .finish()
    }
}

/// Identity of the remote party of a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    address: SipAddress,
}

impl PeerIdentity {
    pub fn parse(address: &str) -> CallControlResult<Self> {
        Ok(Self {
            address: SipAddress::parse(address)?,
        })
    }

    pub fn address(&self) -> &SipAddress {
        &self.address
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.address.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_address() {
        let addr = SipAddress::parse("test@192.168.1.20:5060").unwrap();
        assert_eq!(addr.scheme(), Scheme::Sip);
        assert_eq!(addr.user(), "test");
        assert_eq!(addr.host(), "192.168.1.20");
        assert_eq!(addr.port(), 5060);
        assert_eq!(addr.to_string(), "sip:test@192.168.1.20:5060");
    }

    #[test]
    fn test_parse_with_scheme_prefix() {
        let addr = SipAddress::parse("SIP:bob@example.com").unwrap();
        assert_eq!(addr.user(), "bob");
        assert_eq!(addr.port(), 5060);
        assert_eq!(addr.to_string(), "sip:bob@example.com");

        let secure = SipAddress::parse("sips:carol@example.org").unwrap();
        assert_eq!(secure.scheme(), Scheme::Sips);
        assert_eq!(secure.port(), 5061);
    }

    #[test]
    fn test_rejects_malformed_addresses() {
        for input in ["", "   ", "example.com", "@example.com", "bob@", "bob@host:notaport", "bob@host/path"] {
            let err = SipAddress::parse(input).unwrap_err();
            assert!(
                matches!(err, CallControlError::InvalidAddress { .. }),
                "expected InvalidAddress for {:?}, got {:?}",
                input,
                err
            );
        }
    }

    #[test]
    fn test_rejects_embedded_password_and_fragment() {
        let err = SipAddress::parse("alice:pw@example.com").unwrap_err();
        assert!(matches!(err, CallControlError::InvalidAddress { ref reason, .. } if reason.contains("credentials")));

        let err = SipAddress::parse("bob@example.com#frag").unwrap_err();
        assert!(matches!(err, CallControlError::InvalidAddress { .. }));

        assert!(PeerIdentity::parse("sip:bob@example.com:5070").is_ok());
    }

    #[test]
    fn test_local_identity_debug_hides_secret() {
        let me = LocalIdentity::parse("alice@example.com", " Alice ", "hunter2").unwrap();
        assert_eq!(me.display_name(), "Alice");
        assert_eq!(me.credential_secret(), "hunter2");

        let rendered = format!("{:?}", me);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
