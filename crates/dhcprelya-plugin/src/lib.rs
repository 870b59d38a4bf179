//! The plugin contract: a `Vec<Box<dyn Plugin>>` built once at startup and
//! resolved against a closed, statically-registered set of plugin kinds.
//! Four hook points, each short-circuiting the chain on the first
//! rejection; a plugin that does not care about a hook simply inherits the
//! trait's no-op default.

mod builtin;
mod chain;

pub use builtin::{DenylistPlugin, LogPlugin};
pub use chain::PluginChain;

use std::net::SocketAddr;

use async_trait::async_trait;
use dhcprelya_proto::headers::{EthernetHeader, Ipv4Header, UdpHeader};
use dhcprelya_proto::DhcpView;
use thiserror::Error;

/// Outcome of a single hook invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject,
}

impl Verdict {
    pub fn is_reject(self) -> bool {
        matches!(self, Verdict::Reject)
    }
}

/// Synthesized headers passed to the `send_to_client` hook, mutable so a
/// plugin may rewrite them (e.g. force unicast instead of broadcast).
pub struct ClientHeaders {
    pub ethernet: EthernetHeader,
    pub ip: Ipv4Header,
    pub udp: UdpHeader,
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin {0:?} failed to initialize: {1}")]
    InitFailed(String, String),
    #[error("unknown plugin kind {0:?}")]
    UnknownKind(String),
}

/// The static set of plugin variants this relay ships. A file-driven
/// config's `[<name>-plugin]` section resolves `<name>` against
/// [`PluginKind::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    Log,
    Denylist,
}

impl PluginKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "log" => Some(PluginKind::Log),
            "denylist" => Some(PluginKind::Denylist),
            _ => None,
        }
    }

    pub fn build(self) -> Box<dyn Plugin> {
        match self {
            PluginKind::Log => Box::new(LogPlugin::default()),
            PluginKind::Denylist => Box::new(DenylistPlugin::default()),
        }
    }
}

/// A named, ordered list of raw configuration lines for one plugin
/// instance, resolved from either ISC-style flags (none, today) or a
/// config-file `[<name>-plugin]` section.
#[derive(Debug, Clone)]
pub struct PluginSpec {
    pub kind: PluginKind,
    pub options: Vec<String>,
}

/// The four hook points a plugin may implement. Every method defaults to
/// accepting and doing nothing, so a plugin only overrides what it cares
/// about.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Called exactly once at startup with this plugin's raw option lines.
    /// Failure aborts the whole process.
    fn init(&mut self, _options: &[String]) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called once at shutdown.
    fn destroy(&mut self) {}

    /// Invoked by the listener immediately after the static validator
    /// accepts a captured client frame.
    async fn client_request(
        &self,
        _interface: &str,
        _dhcp: &mut DhcpView<'_>,
        _ethernet: &EthernetHeader,
    ) -> Verdict {
        Verdict::Accept
    }

    /// Invoked by the relay worker once per target server, after
    /// `giaddr`/`hops` have been updated.
    async fn send_to_server(
        &self,
        _server: SocketAddr,
        _interface: &str,
        _dhcp: &mut DhcpView<'_>,
    ) -> Verdict {
        Verdict::Accept
    }

    /// Invoked by the reply worker immediately after a server datagram is
    /// received.
    async fn server_answer(&self, _from: SocketAddr, _dhcp: &mut DhcpView<'_>) -> Verdict {
        Verdict::Accept
    }

    /// Invoked by the reply worker after headers are synthesized but before
    /// checksums are computed and the frame is serialized.
    async fn send_to_client(
        &self,
        _from: SocketAddr,
        _interface: &str,
        _dhcp: &mut DhcpView<'_>,
        _headers: &mut ClientHeaders,
    ) -> Verdict {
        Verdict::Accept
    }
}
