//! Interface and server inventories: built once in [`Inventory::build`]
//! and shared read-only into every task behind an `Arc`.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use dhcprelya_config::RelayConfig;
use dhcprelya_proto::headers::MacAddr;
use lib_ifs::RawFrameSocket;
use tokio::io::unix::AsyncFd;
use tokio::net::UdpSocket;

use crate::error::InventoryError;
use crate::filter::CaptureFilter;
use crate::net::{bind_udp_socket, if_index};

/// Resource ceilings enforced during inventory build.
pub const MAX_INTERFACES: usize = 64;
pub const MAX_SERVERS: usize = 256;
pub const MAX_PLUGINS: usize = 32;

/// A resolved server endpoint.
#[derive(Debug)]
pub struct Server {
    pub name: String,
    pub addr: SocketAddr,
}

/// One opened, capture-capable interface. `raw` doubles as both the
/// capture handle and the BPF-equivalent write handle: on Linux a single
/// `AF_PACKET`/`SOCK_RAW` socket bound to the interface supports both
/// directions, so the listener reads from it and the reply worker writes to
/// it concurrently through the same `Arc`.
pub struct Interface {
    pub name: String,
    pub index: usize,
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    pub udp_socket: UdpSocket,
    pub raw: AsyncFd<RawFrameSocket>,
    pub server_refs: Vec<usize>,
    pub rps_limit: u32,
    pub capture_filter: Option<Arc<CaptureFilter>>,
}

/// The immutable, process-lifetime interface/server/limits inventory,
/// shared across tasks as `Arc`-wrapped values.
pub struct Inventory {
    pub interfaces: Vec<Arc<Interface>>,
    pub servers: Vec<Server>,
    pub max_hops: u8,
    pub max_packet_size: usize,
}

impl Inventory {
    /// Open every socket named by `config`. Fully transactional in spirit --
    /// any failure returns before any task is spawned, so a partially opened
    /// inventory is never observed by the rest of the process (the already-
    /// opened fds are still closed by `Drop` when this function's locals go
    /// out of scope on the error path).
    pub fn build(config: &RelayConfig) -> Result<Self, InventoryError> {
        if config.interfaces.len() > MAX_INTERFACES {
            return Err(InventoryError::TooManyInterfaces(
                config.interfaces.len(),
                MAX_INTERFACES,
            ));
        }
        if config.servers.len() > MAX_SERVERS {
            return Err(InventoryError::TooManyServers(config.servers.len(), MAX_SERVERS));
        }
        if config.plugins.len() > MAX_PLUGINS {
            return Err(InventoryError::TooManyPlugins(config.plugins.len(), MAX_PLUGINS));
        }

        let servers = config
            .servers
            .iter()
            .map(|spec| Server {
                name: spec.name.clone(),
                addr: spec.addr,
            })
            .collect();

        let capture_filter = match &config.bpf_filter {
            Some(expr) => Some(Arc::new(
                CaptureFilter::parse(expr).map_err(|err| InventoryError::BadFilter(expr.clone(), err))?,
            )),
            None => None,
        };

        let mut interfaces = Vec::with_capacity(config.interfaces.len());
        for (index, spec) in config.interfaces.iter().enumerate() {
            let ifindex = if_index(&spec.name)
                .map_err(|err| InventoryError::InterfaceNotFound(spec.name.clone(), err))?;

            let mac = lib_ifs::hardware_addr(&spec.name)
                .map_err(|err| InventoryError::InterfaceNotFound(spec.name.clone(), err))?;

            let detected = lib_ifs::all_ipv4_addrs(&spec.name)
                .map_err(|err| InventoryError::InterfaceNotFound(spec.name.clone(), err))?;

            let ip = resolve_interface_ip(&spec.name, spec.forced_ip, &detected)?;

            let udp_socket = bind_udp_socket(ip, dhcprelya_proto::constants::BOOTPS_PORT)
                .map_err(|err| InventoryError::UdpSocket(spec.name.clone(), err))?;

            let raw_socket = RawFrameSocket::bind(ifindex)
                .map_err(|err| InventoryError::RawSocket(spec.name.clone(), err))?;
            let raw = AsyncFd::new(raw_socket)
                .map_err(|err| InventoryError::RawSocket(spec.name.clone(), err))?;

            interfaces.push(Arc::new(Interface {
                name: spec.name.clone(),
                index,
                mac,
                ip,
                udp_socket,
                raw,
                server_refs: spec.server_refs.clone(),
                rps_limit: config.rps_limit,
                capture_filter: capture_filter.clone(),
            }));
        }

        Ok(Self {
            interfaces,
            servers,
            max_hops: config.max_hops,
            max_packet_size: config.max_packet_size,
        })
    }
}

/// A `bind_ip=` declaration is honored only if that exact
/// address is actually configured on the interface; otherwise it is
/// discarded and the interface falls back to the first detected address.
fn resolve_interface_ip(
    name: &str,
    forced_ip: Option<Ipv4Addr>,
    detected: &[Ipv4Addr],
) -> Result<Ipv4Addr, InventoryError> {
    if let Some(forced) = forced_ip {
        if detected.contains(&forced) {
            return Ok(forced);
        }
        tracing::warn!(
            interface = name,
            bind_ip = %forced,
            "bind_ip address not present on interface, falling back to auto-detection"
        );
    }

    detected
        .first()
        .copied()
        .ok_or_else(|| InventoryError::NoAddress(name.to_string()))
}
