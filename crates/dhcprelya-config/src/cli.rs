use std::path::PathBuf;

use clap::Parser;
use dhcprelya_proto::constants::{BOOTPS_PORT, DHCP_MIN_SIZE, DHCP_MTU_MAX};

use crate::error::ConfigError;
use crate::model::{InterfaceSpec, RelayConfig, ServerSpec};
use crate::resolve::{bounded, resolve_server};

/// ISC-compatible flags:
/// `prog [-d] [-x "<bpf filter>"] [-p<pidfile>] -A <size> -c <hops> -i <ifname> ... <server> ...`
#[derive(Parser, Debug)]
#[command(name = "dhcrelay", about = "DHCP/BOOTP relay agent")]
pub struct Cli {
    /// Stay attached to the controlling terminal; skip daemonizing.
    #[arg(short = 'd', long = "foreground")]
    pub foreground: bool,

    /// Additional pcap-style filter expression, ANDed with the built-in one.
    #[arg(short = 'x', long = "filter", value_name = "EXPR")]
    pub filter: Option<String>,

    /// PID file path; defaults to /var/run/<progname>.pid.
    #[arg(short = 'p', long = "pid-file", value_name = "FILE")]
    pub pid_file: Option<PathBuf>,

    /// Maximum packet size this relay will capture or forward.
    #[arg(short = 'A', value_name = "SIZE", conflicts_with = "config")]
    pub max_packet_size: Option<usize>,

    /// Maximum hop count before a request is dropped (loop prevention).
    #[arg(short = 'c', value_name = "HOPS", conflicts_with = "config")]
    pub max_hops: Option<u8>,

    /// Client-facing interface to listen on; may repeat.
    #[arg(short = 'i', long = "interface", value_name = "IFNAME", conflicts_with = "config")]
    pub interfaces: Vec<String>,

    /// File-driven mode: read an INI-like config instead of flags.
    #[arg(short = 'f', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Trailing server endpoints, applied to every declared interface.
    pub servers: Vec<String>,
}

impl Cli {
    /// Normalize parsed flags into a [`RelayConfig`]. Delegates to the
    /// file-driven parser when `-f` is given; otherwise builds directly
    /// from the ISC-style flags.
    pub fn into_relay_config(self) -> Result<RelayConfig, ConfigError> {
        if let Some(path) = &self.config {
            if !self.servers.is_empty() {
                return Err(ConfigError::MutuallyExclusive("trailing server arguments"));
            }
            return crate::file::parse_config_file(path, self.foreground, self.pid_file);
        }

        self.into_isc_relay_config()
    }

    fn into_isc_relay_config(self) -> Result<RelayConfig, ConfigError> {
        if self.interfaces.is_empty() {
            return Err(ConfigError::NoInterfaces);
        }
        if self.servers.is_empty() {
            return Err(ConfigError::NoServers);
        }

        let max_packet_size = self
            .max_packet_size
            .ok_or(ConfigError::MissingRequired("-A <packet_size>"))?;
        bounded(
            "max_packet_size",
            max_packet_size as i64,
            DHCP_MIN_SIZE as i64,
            DHCP_MTU_MAX as i64,
        )?;

        let max_hops = self.max_hops.ok_or(ConfigError::MissingRequired("-c <max_hops>"))?;
        bounded("max_hops", max_hops as i64, 1, 16)?;

        let mut servers = Vec::with_capacity(self.servers.len());
        let mut server_refs = Vec::with_capacity(self.servers.len());
        for endpoint in &self.servers {
            let addr = resolve_server(endpoint, BOOTPS_PORT)?;
            server_refs.push(servers.len());
            servers.push(ServerSpec {
                name: endpoint.clone(),
                addr,
            });
        }

        let mut interfaces: Vec<InterfaceSpec> = Vec::new();
        for name in self.interfaces {
            let idx = crate::file::get_or_create_interface(&mut interfaces, &name);
            for &server_idx in &server_refs {
                if !interfaces[idx].server_refs.contains(&server_idx) {
                    interfaces[idx].server_refs.push(server_idx);
                }
            }
        }

        Ok(RelayConfig {
            max_packet_size,
            max_hops,
            rps_limit: 0,
            queue_capacity: 1024,
            foreground: self.foreground,
            pid_path: self.pid_file.unwrap_or_else(default_pid_path),
            bpf_filter: self.filter,
            interfaces,
            servers,
            plugins: Vec::new(),
        })
    }
}

pub fn default_pid_path() -> PathBuf {
    let progname = std::env::current_exe()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "dhcprelya".to_string());
    PathBuf::from(format!("/var/run/{progname}.pid"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli {
            foreground: false,
            filter: None,
            pid_file: None,
            max_packet_size: Some(576),
            max_hops: Some(4),
            interfaces: vec!["eth0".to_string()],
            config: None,
            servers: vec!["192.0.2.10:67".to_string()],
        }
    }

    #[test]
    fn isc_mode_builds_relay_config() {
        let cfg = base_cli().into_relay_config().unwrap();
        assert_eq!(cfg.interfaces.len(), 1);
        assert_eq!(cfg.servers.len(), 1);
        assert_eq!(cfg.interfaces[0].server_refs, vec![0]);
    }

    #[test]
    fn isc_mode_merges_repeated_interface_names() {
        let mut cli = base_cli();
        cli.interfaces = vec!["eth0".to_string(), "eth0".to_string()];
        cli.servers = vec!["192.0.2.10:67".to_string(), "192.0.2.11:67".to_string()];
        let cfg = cli.into_relay_config().unwrap();
        assert_eq!(cfg.interfaces.len(), 1);
        assert_eq!(cfg.interfaces[0].server_refs, vec![0, 1]);
    }

    #[test]
    fn isc_mode_requires_at_least_one_interface() {
        let mut cli = base_cli();
        cli.interfaces.clear();
        assert!(matches!(
            cli.into_relay_config(),
            Err(ConfigError::NoInterfaces)
        ));
    }

    #[test]
    fn isc_mode_requires_at_least_one_server() {
        let mut cli = base_cli();
        cli.servers.clear();
        assert!(matches!(cli.into_relay_config(), Err(ConfigError::NoServers)));
    }

    #[test]
    fn isc_mode_rejects_packet_size_out_of_bounds() {
        let mut cli = base_cli();
        cli.max_packet_size = Some(10);
        assert!(matches!(
            cli.into_relay_config(),
            Err(ConfigError::OutOfBounds { field: "max_packet_size", .. })
        ));
    }

    #[test]
    fn isc_mode_rejects_hop_count_out_of_bounds() {
        let mut cli = base_cli();
        cli.max_hops = Some(17);
        assert!(matches!(
            cli.into_relay_config(),
            Err(ConfigError::OutOfBounds { field: "max_hops", .. })
        ));
    }
}
