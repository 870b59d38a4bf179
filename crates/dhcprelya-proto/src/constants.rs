/// Length of a plain Ethernet II header: 2x MAC + ethertype.
pub const ETHER_HDR_LEN: usize = 14;

/// Length of an IPv4 header with no options (IHL = 5).
pub const IPV4_HDR_LEN: usize = 20;

/// Length of a UDP header.
pub const UDP_HDR_LEN: usize = 8;

/// IPv4 + UDP header overhead reserved ahead of a DHCP payload when sizing
/// receive buffers for the reply path.
pub const DHCP_UDP_OVERHEAD: usize = IPV4_HDR_LEN + UDP_HDR_LEN;

/// Length of the fixed BOOTP/DHCP header, up to but not including the magic
/// cookie (RFC 2131 Section 2).
pub const DHCP_FIXED_LEN: usize = 236;

/// Same as [`DHCP_FIXED_LEN`]; named separately because the validator checks
/// it against the UDP payload length rather than the Ethernet frame length.
pub const DHCP_FIXED_NON_UDP: usize = DHCP_FIXED_LEN;

/// Length of the magic cookie that marks the start of the option area.
pub const MAGIC_COOKIE_LEN: usize = 4;

pub const MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];

/// Smallest message size `dhcrelay`-compatible tools accept for `-A`.
pub const DHCP_MIN_SIZE: usize = 300;

/// Largest message size `-A` accepts; matches the common Ethernet MTU.
pub const DHCP_MTU_MAX: usize = 1500;

/// Default BOOTP server port, looked up in the services database at
/// startup and falling back to this RFC-assigned value.
pub const BOOTPS_PORT: u16 = 67;

/// Default BOOTP client port.
pub const BOOTPC_PORT: u16 = 68;

/// `op` field value sent by clients.
pub const BOOTREQUEST: u8 = 1;

/// `op` field value sent by servers.
pub const BOOTREPLY: u8 = 2;

/// Top bit of the 16-bit DHCP `flags` field.
pub const BROADCAST_FLAG: u16 = 0x8000;

/// Ethertype for IPv4.
pub const ETHERTYPE_IPV4: u16 = 0x0800;

/// IP protocol number for UDP.
pub const IPPROTO_UDP: u8 = 17;
