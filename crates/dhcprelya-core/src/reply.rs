//! Reply worker: the single task multiplexing every interface's UDP
//! socket, synthesizing and injecting the raw reply frame.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use dhcprelya_plugin::{ClientHeaders, PluginChain};
use dhcprelya_proto::headers::{EthernetHeader, Ipv4Header, UdpHeader, BROADCAST_MAC};
use dhcprelya_proto::{checksum, constants, get_dhcp_len, DhcpView, FrameError};

use crate::error::RelayError;
use crate::inventory::{Interface, Inventory};

pub async fn run(inventory: Arc<Inventory>, plugins: Arc<PluginChain>) {
    let max_payload = inventory
        .max_packet_size
        .saturating_sub(constants::ETHER_HDR_LEN)
        .saturating_sub(constants::DHCP_UDP_OVERHEAD);
    let mut buf = vec![0u8; max_payload.max(constants::DHCP_MIN_SIZE)];

    let (ready_tx, mut ready_rx) = tokio::sync::mpsc::channel::<usize>(inventory.interfaces.len().max(1));
    for (idx, iface) in inventory.interfaces.iter().enumerate() {
        spawn_readable_watch(idx, iface.clone(), ready_tx.clone());
    }

    while let Some(idx) = ready_rx.recv().await {
        let interface = inventory.interfaces[idx].clone();

        match interface.udp_socket.try_recv_from(&mut buf) {
            Ok((n, from)) => handle_datagram(&inventory, &plugins, &interface, &buf[..n], from).await,
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {}
            Err(err) => tracing::warn!(interface = %interface.name, error = %err, "recv_from failed"),
        }

        spawn_readable_watch(idx, interface, ready_tx.clone());
    }
}

fn spawn_readable_watch(idx: usize, interface: Arc<Interface>, ready_tx: tokio::sync::mpsc::Sender<usize>) {
    tokio::spawn(async move {
        if interface.udp_socket.readable().await.is_ok() {
            let _ = ready_tx.send(idx).await;
        }
    });
}

async fn handle_datagram(
    inventory: &Arc<Inventory>,
    plugins: &Arc<PluginChain>,
    ingress_as_source: &Interface,
    datagram: &[u8],
    from: SocketAddr,
) {
    if datagram.len() < constants::DHCP_MIN_SIZE {
        tracing::debug!(
            interface = %ingress_as_source.name,
            n = datagram.len(),
            error = %RelayError::TooSmall,
            "dropping reply"
        );
        return;
    }

    let mut payload = datagram.to_vec();

    let reject = match DhcpView::new(&mut payload) {
        Ok(mut view) => plugins.server_answer(from, &mut view).await.is_reject(),
        Err(err) => {
            tracing::warn!(%from, error = %err, "dhcp view construction failed");
            return;
        }
    };
    if reject {
        tracing::debug!(%from, "server_answer rejected by plugin");
        return;
    }

    let len = get_dhcp_len(&payload);
    if len == 0 {
        tracing::warn!(%from, error = %RelayError::CorruptPayload, "dropping reply");
        return;
    }
    payload.truncate(len);

    let giaddr = DhcpView::new(&mut payload).expect("just truncated to a valid length").giaddr();
    let egress = match inventory.interfaces.iter().find(|iface| iface.ip == giaddr) {
        Some(iface) => iface.clone(),
        None => {
            tracing::warn!(%giaddr, error = %RelayError::UnknownEgressInterface, "dropping reply");
            return;
        }
    };

    let (op, flags, yiaddr, chaddr) = {
        let view = DhcpView::new(&mut payload).expect("just truncated to a valid length");
        (view.op(), view.flags(), view.yiaddr(), view.chaddr())
    };

    let broadcast = op == constants::BOOTREPLY && (flags & constants::BROADCAST_FLAG) != 0;
    let (dst_ip, dst_mac) = if broadcast {
        (Ipv4Addr::BROADCAST, BROADCAST_MAC)
    } else {
        (yiaddr, chaddr)
    };

    let mut headers = ClientHeaders {
        ethernet: EthernetHeader::ipv4(egress.mac, dst_mac),
        ip: Ipv4Header::new(u32::from(egress.ip), u32::from(dst_ip), payload.len() as u16, constants::IPPROTO_UDP),
        udp: UdpHeader::new(constants::BOOTPS_PORT, constants::BOOTPC_PORT, payload.len() as u16),
    };

    let reject = match DhcpView::new(&mut payload) {
        Ok(mut view) => plugins
            .send_to_client(from, &egress.name, &mut view, &mut headers)
            .await
            .is_reject(),
        Err(err) => {
            tracing::warn!(%from, error = %err, "dhcp view construction failed");
            return;
        }
    };
    if reject {
        tracing::debug!(%from, "send_to_client rejected by plugin");
        return;
    }

    let len = get_dhcp_len(&payload);
    if len == 0 {
        tracing::warn!(%from, error = %RelayError::CorruptPayload, "dropping reply");
        return;
    }
    payload.truncate(len);

    headers.ip.total_len = (constants::IPV4_HDR_LEN + constants::UDP_HDR_LEN + payload.len()) as u16;
    headers.udp.len = (constants::UDP_HDR_LEN + payload.len()) as u16;

    let frame = match build_frame(&headers, &payload) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::error!(interface = %egress.name, error = %err, "failed to serialize reply frame");
            return;
        }
    };

    match egress.raw.get_ref().send(&frame) {
        Ok(n) if n == frame.len() => {}
        Ok(n) => tracing::warn!(
            interface = %egress.name,
            sent = n,
            expected = frame.len(),
            error = %RelayError::ShortWrite,
            "short raw frame write"
        ),
        Err(err) => tracing::warn!(interface = %egress.name, error = %err, "raw frame write failed"),
    }
}

/// Serialize headers and payload, then compute and patch in the IPv4 and
/// UDP checksums.
fn build_frame(headers: &ClientHeaders, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    use binbuf::prelude::*;

    let mut wb = WriteBuffer::new();
    headers.ethernet.write::<BigEndian>(&mut wb)?;
    headers.ip.write::<BigEndian>(&mut wb)?;
    headers.udp.write::<BigEndian>(&mut wb)?;
    wb.write_slice(payload)?;

    let mut frame = wb.bytes().to_vec();

    let ip_start = constants::ETHER_HDR_LEN;
    let ip_checksum = checksum::ipv4_checksum(&frame[ip_start..ip_start + constants::IPV4_HDR_LEN]);
    frame[ip_start + 10..ip_start + 12].copy_from_slice(&ip_checksum.to_be_bytes());

    let udp_start = ip_start + constants::IPV4_HDR_LEN;
    let udp_header_zeroed = frame[udp_start..udp_start + constants::UDP_HDR_LEN].to_vec();
    let src = Ipv4Addr::from(headers.ip.src);
    let dst = Ipv4Addr::from(headers.ip.dst);
    let udp_checksum = checksum::udp_checksum(src, dst, &udp_header_zeroed, payload);
    frame[udp_start + 6..udp_start + 8].copy_from_slice(&udp_checksum.to_be_bytes());

    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(dst_mac: [u8; 6], src_ip: Ipv4Addr, dst_ip: Ipv4Addr, payload_len: u16) -> ClientHeaders {
        ClientHeaders {
            ethernet: EthernetHeader::ipv4([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01], dst_mac),
            ip: Ipv4Header::new(u32::from(src_ip), u32::from(dst_ip), payload_len, constants::IPPROTO_UDP),
            udp: UdpHeader::new(constants::BOOTPS_PORT, constants::BOOTPC_PORT, payload_len),
        }
    }

    /// A unicast OFFER addressed to `yiaddr`/`chaddr` serializes to a frame
    /// whose IPv4 and UDP checksums both verify.
    #[test]
    fn unicast_frame_has_valid_checksums() {
        let payload = vec![1u8, 2, 3, 4, 5];
        let src_ip = Ipv4Addr::new(10, 0, 0, 1);
        let dst_ip = Ipv4Addr::new(10, 0, 0, 55);
        let h = headers(
            [0x11, 0x22, 0x33, 0x44, 0x55, 0x66],
            src_ip,
            dst_ip,
            payload.len() as u16,
        );

        let frame = build_frame(&h, &payload).unwrap();

        assert_eq!(
            frame.len(),
            constants::ETHER_HDR_LEN + constants::IPV4_HDR_LEN + constants::UDP_HDR_LEN + payload.len()
        );

        let ip_start = constants::ETHER_HDR_LEN;
        let ip_header = &frame[ip_start..ip_start + constants::IPV4_HDR_LEN];
        assert_eq!(checksum::internet_checksum(ip_header), 0);

        assert_eq!(&frame[0..6], &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert_eq!(&frame[ip_start + 16..ip_start + 20], &dst_ip.octets());
    }

    /// The broadcast-flag policy is the caller's responsibility;
    /// `build_frame` only ever serializes whatever destination it is
    /// handed, so a broadcast destination still produces valid checksums
    /// and the all-ones ether/IP destination.
    #[test]
    fn broadcast_destination_serializes_with_valid_checksums() {
        let payload = vec![9u8, 8, 7];
        let src_ip = Ipv4Addr::new(10, 0, 0, 1);
        let h = headers(BROADCAST_MAC, src_ip, Ipv4Addr::BROADCAST, payload.len() as u16);

        let frame = build_frame(&h, &payload).unwrap();

        assert_eq!(&frame[0..6], &BROADCAST_MAC);
        let ip_start = constants::ETHER_HDR_LEN;
        assert_eq!(&frame[ip_start + 16..ip_start + 20], &[255, 255, 255, 255]);

        let ip_header = &frame[ip_start..ip_start + constants::IPV4_HDR_LEN];
        assert_eq!(checksum::internet_checksum(ip_header), 0);
    }

    #[test]
    fn ip_and_udp_lengths_match_payload() {
        let payload = vec![0u8; 42];
        let h = headers(
            BROADCAST_MAC,
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::BROADCAST,
            payload.len() as u16,
        );

        let frame = build_frame(&h, &payload).unwrap();

        let ip_start = constants::ETHER_HDR_LEN;
        let total_len = u16::from_be_bytes([frame[ip_start + 2], frame[ip_start + 3]]);
        assert_eq!(total_len as usize, constants::IPV4_HDR_LEN + constants::UDP_HDR_LEN + payload.len());

        let udp_start = ip_start + constants::IPV4_HDR_LEN;
        let udp_len = u16::from_be_bytes([frame[udp_start + 4], frame[udp_start + 5]]);
        assert_eq!(udp_len as usize, constants::UDP_HDR_LEN + payload.len());
    }
}
