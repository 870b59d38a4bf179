use std::net::SocketAddr;

use async_trait::async_trait;
use dhcprelya_proto::headers::EthernetHeader;
use dhcprelya_proto::DhcpView;

use crate::{ClientHeaders, Plugin, PluginError, Verdict};

/// Traces every hook invocation at `DEBUG` and never rejects. A minimal
/// built-in plugin mainly useful for confirming the chain is wired up.
#[derive(Default)]
pub struct LogPlugin;

#[async_trait]
impl Plugin for LogPlugin {
    fn name(&self) -> &str {
        "log"
    }

    async fn client_request(
        &self,
        interface: &str,
        dhcp: &mut DhcpView<'_>,
        _ethernet: &EthernetHeader,
    ) -> Verdict {
        tracing::debug!(interface, hops = dhcp.hops(), "client_request");
        Verdict::Accept
    }

    async fn send_to_server(
        &self,
        server: SocketAddr,
        interface: &str,
        dhcp: &mut DhcpView<'_>,
    ) -> Verdict {
        tracing::debug!(%server, interface, giaddr = %dhcp.giaddr(), "send_to_server");
        Verdict::Accept
    }

    async fn server_answer(&self, from: SocketAddr, dhcp: &mut DhcpView<'_>) -> Verdict {
        tracing::debug!(%from, yiaddr = %dhcp.yiaddr(), "server_answer");
        Verdict::Accept
    }

    async fn send_to_client(
        &self,
        from: SocketAddr,
        interface: &str,
        _dhcp: &mut DhcpView<'_>,
        _headers: &mut ClientHeaders,
    ) -> Verdict {
        tracing::debug!(%from, interface, "send_to_client");
        Verdict::Accept
    }
}

/// Rejects `client_request` when the client's `chaddr` matches a
/// configured MAC. Options are parsed as one colon-separated MAC address
/// per line, e.g. `aa:bb:cc:dd:ee:ff`.
#[derive(Default)]
pub struct DenylistPlugin {
    denied: Vec<[u8; 6]>,
}

impl DenylistPlugin {
    fn parse_mac(line: &str) -> Option<[u8; 6]> {
        let mut mac = [0u8; 6];
        let mut parts = line.trim().split(':');

        for byte in mac.iter_mut() {
            *byte = u8::from_str_radix(parts.next()?, 16).ok()?;
        }

        if parts.next().is_some() {
            return None;
        }

        Some(mac)
    }
}

#[async_trait]
impl Plugin for DenylistPlugin {
    fn name(&self) -> &str {
        "denylist"
    }

    fn init(&mut self, options: &[String]) -> Result<(), PluginError> {
        for line in options {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let mac = Self::parse_mac(trimmed).ok_or_else(|| {
                PluginError::InitFailed(
                    self.name().to_string(),
                    format!("invalid MAC address {trimmed:?}"),
                )
            })?;
            self.denied.push(mac);
        }

        Ok(())
    }

    async fn client_request(
        &self,
        interface: &str,
        dhcp: &mut DhcpView<'_>,
        ethernet: &EthernetHeader,
    ) -> Verdict {
        let chaddr = dhcp.chaddr();

        if self.denied.contains(&chaddr) || self.denied.contains(&ethernet.src) {
            tracing::warn!(interface, mac = ?chaddr, "client_request rejected by denylist");
            return Verdict::Reject;
        }

        Verdict::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhcprelya_proto::constants::{DHCP_FIXED_LEN, MAGIC_COOKIE};

    fn payload_with_chaddr(mac: [u8; 6]) -> Vec<u8> {
        let mut p = vec![0u8; DHCP_FIXED_LEN];
        p[28..34].copy_from_slice(&mac);
        p.extend_from_slice(&MAGIC_COOKIE);
        p.push(0xff);
        p
    }

    #[tokio::test]
    async fn denylist_rejects_matching_chaddr() {
        let mut plugin = DenylistPlugin::default();
        plugin
            .init(&["aa:bb:cc:dd:ee:ff".to_string()])
            .expect("valid MAC");

        let mut buf = payload_with_chaddr([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        let mut view = DhcpView::new(&mut buf).unwrap();
        let ether = EthernetHeader::ipv4([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff], [0; 6]);

        assert_eq!(
            plugin.client_request("eth0", &mut view, &ether).await,
            Verdict::Reject
        );
    }

    #[tokio::test]
    async fn denylist_accepts_unlisted_chaddr() {
        let mut plugin = DenylistPlugin::default();
        plugin
            .init(&["aa:bb:cc:dd:ee:ff".to_string()])
            .expect("valid MAC");

        let mut buf = payload_with_chaddr([1, 2, 3, 4, 5, 6]);
        let mut view = DhcpView::new(&mut buf).unwrap();
        let ether = EthernetHeader::ipv4([1, 2, 3, 4, 5, 6], [0; 6]);

        assert_eq!(
            plugin.client_request("eth0", &mut view, &ether).await,
            Verdict::Accept
        );
    }

    #[test]
    fn init_rejects_malformed_mac() {
        let mut plugin = DenylistPlugin::default();
        assert!(plugin.init(&["not-a-mac".to_string()]).is_err());
    }
}
