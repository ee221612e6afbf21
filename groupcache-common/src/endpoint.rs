//! `spec.md` §3 data model: [`PeerEndpoint`] and [`GroupKey`].

use std::cmp::Ordering;
use std::fmt;

/// A peer's network address: a lowercased host name and a port.
///
/// Ordering and equality are case-insensitive on the host, matching
/// `spec.md`'s "PeerEndpoint — (hostName lowercased, port). Totally ordered
/// by lowercased host then port."
#[derive(Debug, Clone)]
pub struct PeerEndpoint {
    host: String,
    port: u16,
}

impl PeerEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into().to_lowercase(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The `host:port` string used both as an HTTP authority and as a stable
    /// map key.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for PeerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.authority())
    }
}

impl PartialEq for PeerEndpoint {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}
impl Eq for PeerEndpoint {}

impl std::hash::Hash for PeerEndpoint {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.port.hash(state);
    }
}

impl PartialOrd for PeerEndpoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PeerEndpoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.host.cmp(&other.host).then(self.port.cmp(&other.port))
    }
}

/// Identifies a [`crate::stats::Stats`]-observable `Group` uniquely within a
/// process: `(groupName, self-endpoint)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub group_name: String,
    pub self_endpoint: PeerEndpoint,
}

impl GroupKey {
    pub fn new(group_name: impl Into<String>, self_endpoint: PeerEndpoint) -> Self {
        Self {
            group_name: group_name.into(),
            self_endpoint,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.group_name, self.self_endpoint)
    }
}
