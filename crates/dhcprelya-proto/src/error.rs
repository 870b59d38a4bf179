use thiserror::Error;

/// Errors that can occur while parsing a captured link-layer frame.
///
/// These never terminate the process: every caller logs and drops the
/// offending frame (see `RelayError` in `dhcprelya-core` for the family that
/// wraps this one with stage context).
#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("frame shorter than the minimum Ethernet+DHCP header length")]
    TooShort,

    #[error("frame longer than the configured maximum packet size")]
    TooLong,

    #[error("ethertype is not IPv4")]
    NotIpv4,

    #[error("IP protocol is not UDP")]
    NotUdp,

    #[error("UDP payload shorter than the fixed DHCP header plus magic cookie")]
    UdpPayloadTooShort,

    #[error("DHCP magic cookie missing or invalid")]
    BadMagicCookie,

    #[error("DHCP option stream has no terminating 0xff tag")]
    MissingOptionTerminator,

    #[error("buffer error: {0:?}")]
    Buffer(binbuf::BufferError),
}

impl From<binbuf::BufferError> for FrameError {
    fn from(value: binbuf::BufferError) -> Self {
        FrameError::Buffer(value)
    }
}
