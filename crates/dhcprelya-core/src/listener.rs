//! Per-interface listener task: capture, rate-limit, validate,
//! `client_request` hook, enqueue.

use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use dhcprelya_plugin::PluginChain;
use dhcprelya_proto::headers::EthernetHeader;
use dhcprelya_proto::{constants, get_dhcp_len, sanity_check, DhcpView};

use crate::inventory::Interface;
use crate::queue::{QueueSender, QueuedRequest};
use crate::ratelimit::RateLimiter;

/// Runs until the queue's receiving half is dropped (shutdown).
pub async fn run(interface: Arc<Interface>, plugins: Arc<PluginChain>, max_packet_size: usize, queue_tx: QueueSender) {
    let mut buf = vec![0u8; max_packet_size];
    let mut limiter = RateLimiter::new(interface.rps_limit);

    loop {
        let n = match capture_one(&interface, &mut buf).await {
            Ok(n) => n,
            Err(err) => {
                tracing::debug!(interface = %interface.name, error = %err, "capture transient error");
                tokio::time::sleep(Duration::from_millis(1)).await;
                continue;
            }
        };

        let frame = &buf[..n];

        // No pcap-filter-compiling crate is available, so the fixed
        // "udp and dst port bootps and not ether src <iface-mac>" predicate
        // is enforced here in software after capture rather than inside the
        // kernel, ANDed with any user-supplied capture filter.
        if !passes_capture_filter(frame, interface.mac) {
            continue;
        }
        if let Some(extra) = &interface.capture_filter {
            if !extra.matches(frame) {
                continue;
            }
        }

        if !limiter.admit() {
            tracing::debug!(interface = %interface.name, "rate limit drop");
            continue;
        }

        let offsets = match sanity_check(frame, max_packet_size) {
            Ok(offsets) => offsets,
            Err(err) => {
                tracing::warn!(interface = %interface.name, error = %err, "rejected by validator");
                continue;
            }
        };

        if frame[offsets.dhcp_offset] == constants::BOOTREPLY {
            continue;
        }

        let ethernet = EthernetHeader {
            dst: frame[0..6].try_into().unwrap(),
            src: frame[6..12].try_into().unwrap(),
            ethertype: u16::from_be_bytes([frame[12], frame[13]]),
        };

        let ip_start = constants::ETHER_HDR_LEN;
        let original_ip_dst = Ipv4Addr::new(
            frame[ip_start + 16],
            frame[ip_start + 17],
            frame[ip_start + 18],
            frame[ip_start + 19],
        );

        let mut dhcp_payload = frame[offsets.dhcp_offset..].to_vec();
        let len = get_dhcp_len(&dhcp_payload);
        if len == 0 {
            // sanity_check already walked the option stream successfully;
            // this would mean the slice above lost bytes past the frame end.
            tracing::warn!(interface = %interface.name, "option walk disagreed with validator");
            continue;
        }
        dhcp_payload.truncate(len);

        let reject = match DhcpView::new(&mut dhcp_payload) {
            Ok(mut view) => plugins
                .client_request(&interface.name, &mut view, &ethernet)
                .await
                .is_reject(),
            Err(err) => {
                tracing::warn!(interface = %interface.name, error = %err, "dhcp view construction failed");
                continue;
            }
        };
        if reject {
            continue;
        }

        let request = QueuedRequest {
            dhcp_payload,
            ingress: interface.index,
            original_ip_dst,
        };

        if queue_tx.send(request).await.is_err() {
            tracing::debug!(interface = %interface.name, "request queue closed, listener exiting");
            return;
        }
    }
}

async fn capture_one(interface: &Interface, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        let mut guard = interface.raw.readable().await?;
        match guard.try_io(|inner| inner.get_ref().try_recv(buf)) {
            Ok(result) => return result,
            Err(_would_block) => continue,
        }
    }
}

/// `udp and dst port bootps and not ether src <iface-mac>`, evaluated by
/// hand. `frame` has already passed the kernel's `ETH_P_IP` filter, so only
/// the UDP-protocol, destination-port, and own-MAC checks remain.
fn passes_capture_filter(frame: &[u8], own_mac: [u8; 6]) -> bool {
    if frame.len() < constants::ETHER_HDR_LEN + 20 + 8 {
        return false;
    }
    if frame[6..12] == own_mac {
        return false;
    }

    let ip_start = constants::ETHER_HDR_LEN;
    if frame[ip_start + 9] != constants::IPPROTO_UDP {
        return false;
    }

    let ihl = (frame[ip_start] & 0x0f) as usize * 4;
    let udp_start = ip_start + ihl;
    if frame.len() < udp_start + 4 {
        return false;
    }

    let dst_port = u16::from_be_bytes([frame[udp_start + 2], frame[udp_start + 3]]);
    dst_port == constants::BOOTPS_PORT
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with(dst_mac: [u8; 6], src_mac: [u8; 6], protocol: u8, dst_port: u16) -> Vec<u8> {
        let mut frame = vec![0u8; constants::ETHER_HDR_LEN + 20 + 8];
        frame[0..6].copy_from_slice(&dst_mac);
        frame[6..12].copy_from_slice(&src_mac);
        frame[12..14].copy_from_slice(&constants::ETHERTYPE_IPV4.to_be_bytes());
        frame[constants::ETHER_HDR_LEN] = 0x45;
        frame[constants::ETHER_HDR_LEN + 9] = protocol;
        let udp_start = constants::ETHER_HDR_LEN + 20;
        frame[udp_start + 2..udp_start + 4].copy_from_slice(&dst_port.to_be_bytes());
        frame
    }

    #[test]
    fn admits_udp_bootps_from_other_mac() {
        let frame = frame_with([0xff; 6], [1, 2, 3, 4, 5, 6], constants::IPPROTO_UDP, 67);
        assert!(passes_capture_filter(&frame, [0xaa; 6]));
    }

    #[test]
    fn rejects_own_mac_as_source() {
        let own = [0xaa; 6];
        let frame = frame_with([0xff; 6], own, constants::IPPROTO_UDP, 67);
        assert!(!passes_capture_filter(&frame, own));
    }

    #[test]
    fn rejects_non_bootps_port() {
        let frame = frame_with([0xff; 6], [1, 2, 3, 4, 5, 6], constants::IPPROTO_UDP, 53);
        assert!(!passes_capture_filter(&frame, [0xaa; 6]));
    }

    #[test]
    fn rejects_non_udp_protocol() {
        let frame = frame_with([0xff; 6], [1, 2, 3, 4, 5, 6], 6, 67);
        assert!(!passes_capture_filter(&frame, [0xaa; 6]));
    }
}
