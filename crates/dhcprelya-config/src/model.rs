use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use dhcprelya_plugin::PluginSpec;

/// A resolved, not-yet-opened server endpoint.
#[derive(Debug, Clone)]
pub struct ServerSpec {
    pub name: String,
    pub addr: SocketAddr,
}

/// A resolved, not-yet-opened interface declaration. `forced_ip` comes from
/// a `bind_ip=` line in the IP-binding map and is consulted once during
/// interface open; if the address turns out to be absent on the named
/// interface, the caller discards it and falls back to auto-detection.
#[derive(Debug, Clone)]
pub struct InterfaceSpec {
    pub name: String,
    pub forced_ip: Option<Ipv4Addr>,
    pub server_refs: Vec<usize>,
}

/// The normalized runtime configuration produced by bootstrap,
/// independent of which CLI mode produced it. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub max_packet_size: usize,
    pub max_hops: u8,
    pub rps_limit: u32,
    pub queue_capacity: usize,
    pub foreground: bool,
    pub pid_path: PathBuf,
    pub bpf_filter: Option<String>,
    pub interfaces: Vec<InterfaceSpec>,
    pub servers: Vec<ServerSpec>,
    pub plugins: Vec<PluginSpec>,
}

/// Scalar options collected from `[options]` or ISC flags, with the
/// defaults this relay applies when a knob is left unset.
#[derive(Debug, Clone)]
pub struct Options {
    pub max_packet_size: usize,
    pub max_hops: u8,
    pub rps_limit: u32,
    pub queue_capacity: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_packet_size: dhcprelya_proto::constants::DHCP_MTU_MAX,
            max_hops: 4,
            rps_limit: 0,
            queue_capacity: 1024,
        }
    }
}
