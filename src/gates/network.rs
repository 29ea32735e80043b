/*!
 * Network Gate
 * Connection allow-list enforced at a single transport choke point
 *
 * Every guest-reachable client style funnels through `Transport::connect`;
 * the gate's verdict is produced before the transport is touched, so a
 * denial means no DNS lookup and no bytes on the wire.
 */

use crate::core::errors::{DenialReason, SandboxError, SandboxResult};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::net::{IpAddr, TcpStream};

/// Connection scheme requested by the guest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    Http,
    Https,
    Tcp,
}

impl Scheme {
    pub fn parse(s: &str) -> SandboxResult<Self> {
        match s {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            "tcp" => Ok(Scheme::Tcp),
            other => Err(SandboxError::Guest(format!("unknown scheme: {other}"))),
        }
    }

    #[must_use]
    pub const fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
            Scheme::Tcp => 0,
        }
    }
}

/// Host pattern in an allow-list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "pattern", content = "value")]
pub enum HostPattern {
    /// Exact host match
    Exact(String),
    /// Wildcard subdomain match, e.g. "*.example.com" (not the apex itself)
    Suffix(String),
    /// CIDR block, e.g. "192.168.1.0/24"
    Cidr(String),
}

impl HostPattern {
    /// Parse from pattern text: "*.suffix" and "a.b.c.d/nn" forms are
    /// recognized, anything else is an exact host.
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        if pattern.starts_with("*.") {
            HostPattern::Suffix(pattern.to_string())
        } else if pattern.contains('/') {
            HostPattern::Cidr(pattern.to_string())
        } else {
            HostPattern::Exact(pattern.to_string())
        }
    }

    #[must_use]
    pub fn matches(&self, host: &str) -> bool {
        match self {
            HostPattern::Exact(exact) => exact == "*" || exact == host,
            HostPattern::Suffix(pattern) => {
                // Keep the leading dot: "*.example.com" matches
                // "api.example.com" but not "example.com" itself
                let domain = &pattern[1..];
                host.ends_with(domain) && host.len() > domain.len()
            }
            HostPattern::Cidr(cidr) => matches_cidr(host, cidr),
        }
    }
}

fn matches_cidr(host: &str, cidr: &str) -> bool {
    let parts: Vec<&str> = cidr.split('/').collect();
    if parts.len() != 2 {
        return false;
    }

    let Ok(network_addr) = parts[0].parse::<IpAddr>() else {
        return false;
    };
    let Ok(prefix_len) = parts[1].parse::<u8>() else {
        return false;
    };
    let Ok(host_addr) = host.parse::<IpAddr>() else {
        return false;
    };

    match (network_addr, host_addr) {
        (IpAddr::V4(net), IpAddr::V4(host)) => {
            if prefix_len > 32 {
                return false;
            }
            let mask = if prefix_len == 0 {
                0
            } else {
                !((1u32 << (32 - prefix_len)) - 1)
            };
            (u32::from(net) & mask) == (u32::from(host) & mask)
        }
        (IpAddr::V6(net), IpAddr::V6(host)) => {
            if prefix_len > 128 {
                return false;
            }
            let mask = if prefix_len == 0 {
                0
            } else {
                !((1u128 << (128 - prefix_len)) - 1)
            };
            (u128::from(net) & mask) == (u128::from(host) & mask)
        }
        _ => false,
    }
}

/// Outbound connection policy for one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy", content = "patterns")]
pub enum NetworkPolicy {
    /// No outbound connections at all
    DenyAll,
    /// Only hosts matching one of the patterns
    Allow(Vec<HostPattern>),
}

impl NetworkPolicy {
    /// Allow-list from pattern texts
    #[must_use]
    pub fn allow_hosts(patterns: &[&str]) -> Self {
        NetworkPolicy::Allow(patterns.iter().map(|p| HostPattern::parse(p)).collect())
    }

    #[must_use]
    pub fn permits(&self, host: &str) -> bool {
        match self {
            NetworkPolicy::DenyAll => false,
            NetworkPolicy::Allow(patterns) => patterns.iter().any(|p| p.matches(host)),
        }
    }
}

impl Default for NetworkPolicy {
    fn default() -> Self {
        NetworkPolicy::DenyAll
    }
}

/// Verdict for one connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectVerdict {
    Allowed,
    Denied { reason: DenialReason },
}

/// One connection attempt and its verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub host: String,
    pub port: u16,
    pub scheme: Scheme,
    pub verdict: ConnectVerdict,
}

impl ConnectionRequest {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.verdict == ConnectVerdict::Allowed
    }

    /// "host:port" form used in errors and audit entries
    #[must_use]
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Convert the verdict into a raisable result
    pub fn into_result(self) -> SandboxResult<()> {
        match self.verdict {
            ConnectVerdict::Allowed => Ok(()),
            ConnectVerdict::Denied { reason } => Err(SandboxError::NetworkDenied {
                target: self.target(),
                reason,
            }),
        }
    }
}

/// Gate deciding, per connection attempt, whether a target is reachable
#[derive(Debug, Clone)]
pub struct NetworkGate {
    policy: NetworkPolicy,
}

impl NetworkGate {
    #[must_use]
    pub fn new(policy: NetworkPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn check(&self, host: &str, port: u16, scheme: Scheme) -> ConnectionRequest {
        let verdict = match &self.policy {
            NetworkPolicy::DenyAll => ConnectVerdict::Denied {
                reason: DenialReason::DenyAll,
            },
            NetworkPolicy::Allow(_) if self.policy.permits(host) => ConnectVerdict::Allowed,
            NetworkPolicy::Allow(_) => ConnectVerdict::Denied {
                reason: DenialReason::NotAllowed,
            },
        };
        ConnectionRequest {
            host: host.to_string(),
            port,
            scheme,
            verdict,
        }
    }
}

/// Bidirectional byte stream handed to the guest after an approved dial
pub trait Conn: Read + Write + Send {}

impl<T: Read + Write + Send> Conn for T {}

/// Low-level dial primitive, the one choke point below every client style.
/// The session injects the implementation; tests inject a recorder to prove
/// denied targets are never dialed.
pub trait Transport: Send + Sync {
    fn connect(&self, host: &str, port: u16) -> std::io::Result<Box<dyn Conn>>;
}

/// Plain TCP transport. TLS for https targets is the host's concern: inject
/// a TLS-capable transport where guests need it.
#[derive(Debug, Clone, Default)]
pub struct TcpTransport;

impl Transport for TcpTransport {
    fn connect(&self, host: &str, port: u16) -> std::io::Result<Box<dyn Conn>> {
        let stream = TcpStream::connect((host, port))?;
        Ok(Box::new(stream))
    }
}
