//! Relay worker: the single consumer of the request queue.

use std::net::Ipv4Addr;
use std::sync::Arc;

use dhcprelya_plugin::PluginChain;
use dhcprelya_proto::{get_dhcp_len, DhcpView};

use crate::error::RelayError;
use crate::inventory::Inventory;
use crate::queue::QueueReceiver;

/// Hop-count loop prevention and `giaddr` bookkeeping, pulled out of
/// [`run`] as a pure function over an already-built [`DhcpView`] so the two
/// testable invariants (hops increment by exactly one below the limit,
/// `giaddr` is stamped only when unset) can be exercised without a queue or
/// an inventory.
///
/// Returns `true` if the packet is admitted for forwarding.
fn admit_and_stamp(view: &mut DhcpView<'_>, max_hops: u8, ingress_ip: Ipv4Addr) -> bool {
    if view.hops() >= max_hops {
        return false;
    }

    view.set_hops(view.hops() + 1);
    if view.giaddr() == Ipv4Addr::UNSPECIFIED {
        view.set_giaddr(ingress_ip);
    }
    true
}

pub async fn run(inventory: Arc<Inventory>, plugins: Arc<PluginChain>, mut queue_rx: QueueReceiver) {
    while let Some(mut request) = queue_rx.recv().await {
        let ingress = &inventory.interfaces[request.ingress];

        let admitted = {
            let mut view = match DhcpView::new(&mut request.dhcp_payload) {
                Ok(view) => view,
                Err(err) => {
                    tracing::warn!(interface = %ingress.name, error = %err, "queued payload too short");
                    continue;
                }
            };

            let hops_before = view.hops();
            let ok = admit_and_stamp(&mut view, inventory.max_hops, ingress.ip);
            if !ok {
                tracing::warn!(
                    interface = %ingress.name,
                    hops = hops_before,
                    error = %RelayError::HopLimitExceeded,
                    "dropping queued request"
                );
            }
            ok
        };
        if !admitted {
            continue;
        }

        for &server_idx in &ingress.server_refs {
            let server = &inventory.servers[server_idx];
            let mut payload = request.dhcp_payload.clone();

            let reject = match DhcpView::new(&mut payload) {
                Ok(mut view) => plugins
                    .send_to_server(server.addr, &ingress.name, &mut view)
                    .await
                    .is_reject(),
                Err(err) => {
                    tracing::warn!(server = %server.addr, error = %err, "dhcp view construction failed");
                    continue;
                }
            };
            if reject {
                tracing::debug!(server = %server.addr, "send_to_server rejected by plugin");
                continue;
            }

            let len = get_dhcp_len(&payload);
            if len == 0 {
                tracing::error!(server = %server.addr, error = %RelayError::CorruptPayload, "dropping");
                continue;
            }

            if let Err(err) = ingress.udp_socket.send_to(&payload[..len], server.addr).await {
                tracing::warn!(server = %server.addr, error = %err, "sendto failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhcprelya_proto::constants::{DHCP_FIXED_LEN, MAGIC_COOKIE};

    fn payload() -> Vec<u8> {
        let mut p = vec![0u8; DHCP_FIXED_LEN];
        p.extend_from_slice(&MAGIC_COOKIE);
        p.push(0xff);
        p
    }

    #[test]
    fn hops_below_limit_increments_by_one_and_giaddr_is_stamped() {
        let mut buf = payload();
        let mut view = DhcpView::new(&mut buf).unwrap();
        let ingress_ip = Ipv4Addr::new(10, 0, 0, 1);

        assert!(admit_and_stamp(&mut view, 4, ingress_ip));
        assert_eq!(view.hops(), 1);
        assert_eq!(view.giaddr(), ingress_ip);
    }

    #[test]
    fn hops_at_limit_minus_one_forwards_with_hops_equal_to_limit() {
        let mut buf = payload();
        let mut view = DhcpView::new(&mut buf).unwrap();
        view.set_hops(3);

        assert!(admit_and_stamp(&mut view, 4, Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(view.hops(), 4);
    }

    #[test]
    fn hops_at_limit_is_dropped() {
        let mut buf = payload();
        let mut view = DhcpView::new(&mut buf).unwrap();
        view.set_hops(4);

        assert!(!admit_and_stamp(&mut view, 4, Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(view.hops(), 4, "hops must not be touched once dropped");
    }

    #[test]
    fn preexisting_giaddr_is_left_unchanged() {
        let mut buf = payload();
        let mut view = DhcpView::new(&mut buf).unwrap();
        let existing = Ipv4Addr::new(192, 0, 2, 1);
        view.set_giaddr(existing);

        assert!(admit_and_stamp(&mut view, 4, Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(view.giaddr(), existing);
    }
}
