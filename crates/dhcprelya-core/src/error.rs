use thiserror::Error;

/// Resource errors encountered while opening the interface/server/plugin
/// inventory. All fatal at startup.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("interface {0:?} not found: {1}")]
    InterfaceNotFound(String, #[source] std::io::Error),

    #[error("interface {0:?} has no usable IPv4 address")]
    NoAddress(String),

    #[error("failed to open raw capture/write socket on {0:?}: {1}")]
    RawSocket(String, #[source] std::io::Error),

    #[error("failed to bind UDP socket on {0:?}: {1}")]
    UdpSocket(String, #[source] std::io::Error),

    #[error("too many interfaces ({0}); limit is {1}")]
    TooManyInterfaces(usize, usize),

    #[error("too many servers ({0}); limit is {1}")]
    TooManyServers(usize, usize),

    #[error("too many plugins ({0}); limit is {1}")]
    TooManyPlugins(usize, usize),

    #[error("invalid capture filter {0:?}: {1}")]
    BadFilter(String, #[source] crate::filter::FilterParseError),
}

/// Steady-state per-packet errors. Every variant is logged and the
/// offending packet is dropped; the process never terminates over one of
/// these.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RelayError {
    #[error("hop count at or above max_hops")]
    HopLimitExceeded,

    #[error("option walk after plugin mutation returned 0 (corrupt payload)")]
    CorruptPayload,

    #[error("no interface owns this giaddr")]
    UnknownEgressInterface,

    #[error("raw frame write was short")]
    ShortWrite,

    #[error("received datagram below DHCP_MIN_SIZE")]
    TooSmall,
}
