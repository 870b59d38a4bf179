use std::net::SocketAddr;

use dhcprelya_proto::headers::EthernetHeader;
use dhcprelya_proto::DhcpView;

use crate::{ClientHeaders, Plugin, PluginError, PluginSpec, Verdict};

/// The ordered plugin chain built once at startup. Hook evaluation
/// order equals registration order; the first rejection short-circuits the
/// remaining plugins for that hook.
pub struct PluginChain {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginChain {
    /// Build the chain from its specs, calling `init` on each plugin in
    /// order. The first `init` failure aborts construction -- this is a
    /// startup error, never a steady-state one.
    pub fn build(specs: &[PluginSpec]) -> Result<Self, PluginError> {
        let mut plugins = Vec::with_capacity(specs.len());

        for spec in specs {
            let mut plugin = spec.kind.build();
            plugin
                .init(&spec.options)
                .map_err(|err| PluginError::InitFailed(plugin.name().to_string(), err.to_string()))?;
            plugins.push(plugin);
        }

        Ok(Self { plugins })
    }

    pub fn empty() -> Self {
        Self { plugins: Vec::new() }
    }

    pub async fn client_request(
        &self,
        interface: &str,
        dhcp: &mut DhcpView<'_>,
        ethernet: &EthernetHeader,
    ) -> Verdict {
        for plugin in &self.plugins {
            if plugin.client_request(interface, dhcp, ethernet).await.is_reject() {
                return Verdict::Reject;
            }
        }
        Verdict::Accept
    }

    pub async fn send_to_server(
        &self,
        server: SocketAddr,
        interface: &str,
        dhcp: &mut DhcpView<'_>,
    ) -> Verdict {
        for plugin in &self.plugins {
            if plugin.send_to_server(server, interface, dhcp).await.is_reject() {
                return Verdict::Reject;
            }
        }
        Verdict::Accept
    }

    pub async fn server_answer(&self, from: SocketAddr, dhcp: &mut DhcpView<'_>) -> Verdict {
        for plugin in &self.plugins {
            if plugin.server_answer(from, dhcp).await.is_reject() {
                return Verdict::Reject;
            }
        }
        Verdict::Accept
    }

    pub async fn send_to_client(
        &self,
        from: SocketAddr,
        interface: &str,
        dhcp: &mut DhcpView<'_>,
        headers: &mut ClientHeaders,
    ) -> Verdict {
        for plugin in &self.plugins {
            if plugin
                .send_to_client(from, interface, dhcp, headers)
                .await
                .is_reject()
            {
                return Verdict::Reject;
            }
        }
        Verdict::Accept
    }

    pub fn destroy(&mut self) {
        for plugin in &mut self.plugins {
            plugin.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dhcprelya_proto::constants::{DHCP_FIXED_LEN, MAGIC_COOKIE};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAccept(std::sync::Arc<AtomicUsize>);

    #[async_trait]
    impl Plugin for CountingAccept {
        fn name(&self) -> &str {
            "counting-accept"
        }

        async fn client_request(
            &self,
            _interface: &str,
            _dhcp: &mut DhcpView<'_>,
            _ethernet: &EthernetHeader,
        ) -> Verdict {
            self.0.fetch_add(1, Ordering::SeqCst);
            Verdict::Accept
        }
    }

    struct AlwaysReject;

    #[async_trait]
    impl Plugin for AlwaysReject {
        fn name(&self) -> &str {
            "always-reject"
        }

        async fn client_request(
            &self,
            _interface: &str,
            _dhcp: &mut DhcpView<'_>,
            _ethernet: &EthernetHeader,
        ) -> Verdict {
            Verdict::Reject
        }
    }

    fn payload() -> Vec<u8> {
        let mut p = vec![0u8; DHCP_FIXED_LEN];
        p.extend_from_slice(&MAGIC_COOKIE);
        p.push(0xff);
        p
    }

    #[tokio::test]
    async fn reject_short_circuits_remaining_plugins() {
        let counter = std::sync::Arc::new(AtomicUsize::new(0));
        let chain = PluginChain {
            plugins: vec![Box::new(AlwaysReject), Box::new(CountingAccept(counter.clone()))],
        };

        let mut buf = payload();
        let mut view = DhcpView::new(&mut buf).unwrap();
        let ether = EthernetHeader::ipv4([0; 6], [0; 6]);

        let verdict = chain.client_request("eth0", &mut view, &ether).await;
        assert_eq!(verdict, Verdict::Reject);
        assert_eq!(counter.load(Ordering::SeqCst), 0, "plugins after a reject must not run");
    }

    #[tokio::test]
    async fn all_accept_runs_every_plugin() {
        let counter = std::sync::Arc::new(AtomicUsize::new(0));
        let chain = PluginChain {
            plugins: vec![
                Box::new(CountingAccept(counter.clone())),
                Box::new(CountingAccept(counter.clone())),
            ],
        };

        let mut buf = payload();
        let mut view = DhcpView::new(&mut buf).unwrap();
        let ether = EthernetHeader::ipv4([0; 6], [0; 6]);

        let verdict = chain.client_request("eth0", &mut view, &ether).await;
        assert_eq!(verdict, Verdict::Accept);
        assert_eq!(counter.load(Ordering::SeqCst), 2, "every plugin must run when all accept");
    }
}
