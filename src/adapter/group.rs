//! Phase-ordered startup and shutdown for sibling adapters

use crate::adapter::inbound::InboundChannelAdapter;
use crate::error::AdapterResult;
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::info;

/// Coordinates start and stop order across sibling adapters.
///
/// Lower phases start first and stop last. Adapters with equal phases keep
/// their registration order. Adapters built with `auto_startup = false` are
/// skipped by `start_all` and can still be started individually.
#[derive(Default)]
pub struct AdapterGroup {
    adapters: Vec<Arc<InboundChannelAdapter>>,
}

impl AdapterGroup {
    /// An empty group
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter with the group
    pub fn add(&mut self, adapter: Arc<InboundChannelAdapter>) {
        self.adapters.push(adapter);
    }

    /// Registered adapters, in registration order
    pub fn adapters(&self) -> &[Arc<InboundChannelAdapter>] {
        &self.adapters
    }

    /// Start auto-startup adapters in ascending phase order
    pub async fn start_all(&self) -> AdapterResult<()> {
        let mut ordered: Vec<_> = self
            .adapters
            .iter()
            .filter(|adapter| adapter.auto_startup())
            .collect();
        ordered.sort_by_key(|adapter| adapter.phase());

        for adapter in ordered {
            adapter.start().await?;
            info!(
                client_id = adapter.client_id(),
                phase = adapter.phase(),
                "adapter started"
            );
        }
        Ok(())
    }

    /// Stop every started adapter in descending phase order
    pub async fn stop_all(&self) -> AdapterResult<()> {
        let mut ordered: Vec<_> = self.adapters.iter().collect();
        ordered.sort_by_key(|adapter| Reverse(adapter.phase()));

        for adapter in ordered {
            adapter.stop().await?;
        }
        Ok(())
    }
}
