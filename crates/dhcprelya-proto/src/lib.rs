//! Wire formats for the DHCP relay's packet plane: link-layer/IPv4/UDP
//! header views, the DHCP fixed-header view and option walker, one's
//! complement checksums, and the frame-level error taxonomy.
//!
//! Nothing in this crate touches sockets or the filesystem; it is pure byte
//! manipulation so the validator and the header-synthesis path can be unit
//! tested without a network namespace.

pub mod checksum;
pub mod constants;
pub mod dhcp;
pub mod error;
pub mod headers;
pub mod validator;

pub use dhcp::{get_dhcp_len, DhcpView};
pub use error::FrameError;
pub use headers::{EthernetHeader, Ipv4Header, MacAddr, UdpHeader, BROADCAST_MAC};
pub use validator::{sanity_check, FrameOffsets};
