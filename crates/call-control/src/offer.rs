//! Static media offers
//!
//! Media negotiation belongs to the engine. The controller only needs a
//! pre-scoped audio offer to start or answer a call, and the same offer with
//! `a=sendonly` appended to put the peer on hold.

use std::fmt;
use std::net::IpAddr;

use bytes::Bytes;

/// Opaque session description handed to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    body: Bytes,
}

impl Offer {
    /// Wrap an arbitrary session description
    pub fn from_bytes(body: impl Into<Bytes>) -> Self {
        Self { body: body.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Check if this offer suspends outgoing media
    pub fn is_hold(&self) -> bool {
        std::str::from_utf8(&self.body)
            .map(|sdp| sdp.lines().any(|line| line.trim_end() == "a=sendonly"))
            .unwrap_or(false)
    }
}

impl fmt::Display for Offer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.body))
    }
}

/// Builds the audio offers used for call setup, hold and resume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferTemplate {
    local_ip: IpAddr,
    media_port: u16,
}

impl OfferTemplate {
    pub fn new(local_ip: IpAddr, media_port: u16) -> Self {
        Self {
            local_ip,
            media_port,
        }
    }

    /// Offer used to place or answer a call
    pub fn call_offer(&self) -> Offer {
        Offer::from_bytes(self.sdp())
    }

    /// Offer that puts the peer on hold
    pub fn hold_offer(&self) -> Offer {
        let mut sdp = self.sdp();
        sdp.push_str("a=sendonly\r\n");
        Offer::from_bytes(sdp)
    }

    /// Offer that resumes a held call
    pub fn resume_offer(&self) -> Offer {
        self.call_offer()
    }

    fn sdp(&self) -> String {
        let addr_type = match self.local_ip {
            IpAddr::V4(_) => "IP4",
            IpAddr::V6(_) => "IP6",
        };
        format!(
            "v=0\r\n\
             o=4855 13760799956958020 13760799956958020 IN {addr_type} {ip}\r\n\
             s=mysession session\r\n\
             c=IN {addr_type} {ip}\r\n\
             t=0 0\r\n\
             m=audio {port} RTP/AVP 0 4 18\r\n\
             a=rtpmap:0 PCMU/8000\r\n\
             a=rtpmap:4 G723/8000\r\n\
             a=rtpmap:18 G729A/8000\r\n\
             a=ptime:20\r\n",
            addr_type = addr_type,
            ip = self.local_ip,
            port = self.media_port,
        )
    }
}
