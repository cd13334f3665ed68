//! Controller configuration
//!
//! Settings the presentation layer collects from the user. Persisting them is
//! the caller's job; this module only validates them and turns them into
//! identities and offers.
//!
//! ```rust
//! use rvoip_call_control::ControllerConfig;
//!
//! let config = ControllerConfig::new("alice@192.168.1.20:5060")
//!     .with_password("secret")
//!     .with_display_name("Alice")
//!     .with_peer_address("bob@192.168.1.30")
//!     .with_local_ip("192.168.1.20".parse().unwrap());
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.local_media_port, 6022);
//! ```

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

use crate::{
    error::{CallControlError, CallControlResult},
    identity::{LocalIdentity, PeerIdentity},
    offer::OfferTemplate,
};

/// Configuration for a call controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Address to register, e.g. `alice@registrar.example.com:5060`
    pub local_address: String,
    /// Credential used for registration
    #[serde(skip_serializing)]
    pub password: String,
    pub display_name: String,
    /// Default call target
    pub peer_address: Option<String>,
    /// Address placed in media offers
    pub local_ip: IpAddr,
    pub local_media_port: u16,
    /// How many status updates a slow observer may lag behind
    pub status_capacity: usize,
}

impl ControllerConfig {
    pub fn new(local_address: impl Into<String>) -> Self {
        Self {
            local_address: local_address.into(),
            ..Default::default()
        }
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> CallControlResult<Self> {
        serde_json::from_str(json).map_err(|e| CallControlError::InvalidConfiguration {
            field: "json".to_string(),
            reason: e.to_string(),
        })
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_peer_address(mut self, peer_address: impl Into<String>) -> Self {
        self.peer_address = Some(peer_address.into());
        self
    }

    pub fn with_local_ip(mut self, local_ip: IpAddr) -> Self {
        self.local_ip = local_ip;
        self
    }

    pub fn with_media_port(mut self, port: u16) -> Self {
        self.local_media_port = port;
        self
    }

    pub fn with_status_capacity(mut self, capacity: usize) -> Self {
        self.status_capacity = capacity;
        self
    }

    /// Check every field without building anything
    pub fn validate(&self) -> CallControlResult<()> {
        self.local_identity()?;
        self.peer_identity()?;
        if self.local_media_port == 0 {
            return Err(CallControlError::InvalidConfiguration {
                field: "local_media_port".to_string(),
                reason: "port must be non-zero".to_string(),
            });
        }
        if self.status_capacity == 0 {
            return Err(CallControlError::InvalidConfiguration {
                field: "status_capacity".to_string(),
                reason: "capacity must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn local_identity(&self) -> CallControlResult<LocalIdentity> {
        if self.local_address.trim().is_empty() {
            return Err(CallControlError::MissingConfiguration {
                field: "local_address".to_string(),
            });
        }
        LocalIdentity::parse(&self.local_address, self.display_name.as_str(), self.password.as_str())
    }

    /// The default call target, if one is configured
    pub fn peer_identity(&self) -> CallControlResult<Option<PeerIdentity>> {
        match self.peer_address.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(address) => PeerIdentity::parse(address).map(Some),
        }
    }

    pub fn offer_template(&self) -> OfferTemplate {
        OfferTemplate::new(self.local_ip, self.local_media_port)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            local_address: String::new(),
            password: String::new(),
            display_name: String::new(),
            peer_address: None,
            local_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            local_media_port: 6022,
            status_capacity: 64,
        }
    }
}
