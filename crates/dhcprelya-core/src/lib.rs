//! Bootstrap and the fixed task set: opens the inventory, builds
//! the plugin chain, installs the PID file, and spawns one listener task per
//! interface plus the single relay and reply tasks.

mod error;
mod filter;
mod inventory;
mod listener;
mod net;
mod pidfile;
mod queue;
mod ratelimit;
mod relay;
mod reply;

pub use error::{InventoryError, RelayError};
pub use inventory::{Interface, Inventory, Server, MAX_INTERFACES, MAX_PLUGINS, MAX_SERVERS};
pub use pidfile::PidFile;
pub use queue::QueuedRequest;

use std::sync::Arc;

use dhcprelya_config::RelayConfig;
use dhcprelya_plugin::{PluginChain, PluginError};
use tokio::task::JoinHandle;

/// Everything spawned at startup, held by `main` so it can wait on or abort
/// the task set during shutdown.
pub struct Relay {
    pub inventory: Arc<Inventory>,
    pub plugins: Arc<PluginChain>,
    pub pid_file: PidFile,
    listener_tasks: Vec<JoinHandle<()>>,
    relay_task: JoinHandle<()>,
    reply_task: JoinHandle<()>,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error(transparent)]
    Plugin(#[from] PluginError),
    #[error("failed to write pid file {0:?}: {1}")]
    PidFile(std::path::PathBuf, #[source] std::io::Error),
}

impl Relay {
    /// Opens every interface/server, builds the plugin chain, writes the PID
    /// file, and spawns the listener/relay/reply tasks. Nothing is
    /// spawned if any step before it fails.
    pub fn start(config: &RelayConfig) -> Result<Self, StartupError> {
        let inventory = Arc::new(Inventory::build(config)?);
        let plugins = Arc::new(PluginChain::build(&config.plugins)?);
        let pid_file = PidFile::write(config.pid_path.clone())
            .map_err(|err| StartupError::PidFile(config.pid_path.clone(), err))?;

        let (queue_tx, queue_rx) = queue::channel(config.queue_capacity);

        let mut listener_tasks = Vec::with_capacity(inventory.interfaces.len());
        for interface in &inventory.interfaces {
            let interface = interface.clone();
            let plugins = plugins.clone();
            let max_packet_size = inventory.max_packet_size;
            let queue_tx = queue_tx.clone();
            listener_tasks.push(tokio::spawn(async move {
                listener::run(interface, plugins, max_packet_size, queue_tx).await
            }));
        }
        drop(queue_tx);

        let relay_task = {
            let inventory = inventory.clone();
            let plugins = plugins.clone();
            tokio::spawn(async move { relay::run(inventory, plugins, queue_rx).await })
        };

        let reply_task = {
            let inventory = inventory.clone();
            let plugins = plugins.clone();
            tokio::spawn(async move { reply::run(inventory, plugins).await })
        };

        Ok(Self {
            inventory,
            plugins,
            pid_file,
            listener_tasks,
            relay_task,
            reply_task,
        })
    }

    /// Coordinated shutdown: stop the task set, call every plugin's
    /// `destroy()`, then remove the PID file via `PidFile`'s `Drop`.
    pub async fn shutdown(mut self) {
        let listener_tasks = std::mem::take(&mut self.listener_tasks);
        for task in listener_tasks {
            task.abort();
            let _ = task.await;
        }

        // Joining an aborted handle blocks until the task's future (and the
        // Arc clone it owns) has actually been dropped, which is what makes
        // the `Arc::get_mut` below reliably succeed.
        let relay_task = self.relay_task;
        relay_task.abort();
        let _ = relay_task.await;

        let reply_task = self.reply_task;
        reply_task.abort();
        let _ = reply_task.await;

        match Arc::get_mut(&mut self.plugins) {
            Some(plugins) => plugins.destroy(),
            None => tracing::warn!("plugin chain still referenced elsewhere at shutdown, skipping destroy()"),
        }
    }
}
