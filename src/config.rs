use crate::tcp::wrap32::Wrap32;

/// How long a learned IP-to-Ethernet mapping stays usable, in milliseconds.
pub const ARP_CACHE_TIMEOUT_MS: u64 = 30_000;

/// Minimum interval between two ARP requests for the same IP, in milliseconds.
pub const ARP_DEBOUNCE_TIMEOUT_MS: u64 = 5_000;

/// Fixed parameters of a TCP endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct TcpConfig {
    pub capacity: usize,           // Capacity of the inbound and outbound byte streams
    pub max_payload_size: usize,   // Upper bound on the payload of a single segment
    pub rt_timeout: u64,           // Initial retransmission timeout, in milliseconds
    pub fixed_isn: Option<Wrap32>, // Use this ISN instead of a random one
}

impl TcpConfig {
    pub const DEFAULT_CAPACITY: usize = 64_000;
    pub const MAX_PAYLOAD_SIZE: usize = 1000;
    pub const TIMEOUT_DFLT: u64 = 1000;
    /// Consecutive retransmissions a caller should tolerate before giving up
    pub const MAX_RETX_ATTEMPTS: u64 = 8;
}

impl Default for TcpConfig {
    fn default() -> Self {
        TcpConfig {
            capacity: Self::DEFAULT_CAPACITY,
            max_payload_size: Self::MAX_PAYLOAD_SIZE,
            rt_timeout: Self::TIMEOUT_DFLT,
            fixed_isn: None,
        }
    }
}
