use std::net::Ipv4Addr;

/// A client request captured by a listener, in flight to the relay worker.
/// Owned exclusively by whichever stage currently holds it.
#[derive(Debug)]
pub struct QueuedRequest {
    pub dhcp_payload: Vec<u8>,
    pub ingress: usize,
    pub original_ip_dst: Ipv4Addr,
}

pub type QueueSender = tokio::sync::mpsc::Sender<QueuedRequest>;
pub type QueueReceiver = tokio::sync::mpsc::Receiver<QueuedRequest>;

/// Bounded channel backing the request queue: producers suspend on `send`
/// once `capacity` entries are in flight rather than dropping anything.
pub fn channel(capacity: usize) -> (QueueSender, QueueReceiver) {
    tokio::sync::mpsc::channel(capacity.max(1))
}
