use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tracing::{debug, trace};
use uuid::Uuid;

use retro_types::events::GatewayEvent;

/// Buffered events per retrospective before slow receivers start lagging.
const CHANNEL_CAPACITY: usize = 256;

/// Fans events out to everyone following the same retrospective.
///
/// One broadcast channel per retrospective id, created on first subscribe
/// and dropped once its last receiver is gone. Delivery is best effort:
/// clients that miss events catch up by refetching the REST resources.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// retrospective_id -> sender
    retros: RwLock<HashMap<Uuid, broadcast::Sender<GatewayEvent>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow one retrospective's events.
    pub async fn subscribe(&self, retro_id: Uuid) -> broadcast::Receiver<GatewayEvent> {
        let mut retros = self.inner.retros.write().await;
        retros
            .entry(retro_id)
            .or_insert_with(|| {
                debug!("Opening event channel for retrospective {}", retro_id);
                broadcast::channel(CHANNEL_CAPACITY).0
            })
            .subscribe()
    }

    /// Deliver an event to the followers of the retrospective it belongs to.
    /// Returns how many receivers got it.
    pub async fn publish(&self, event: GatewayEvent) -> usize {
        let Some(retro_id) = event.retrospective_id() else {
            return 0;
        };

        let delivered = {
            let retros = self.inner.retros.read().await;
            match retros.get(&retro_id) {
                Some(tx) => tx.send(event).ok(),
                None => return 0,
            }
        };

        match delivered {
            Some(n) => {
                trace!("Delivered event for {} to {} receivers", retro_id, n);
                n
            }
            None => {
                // every receiver went away without pruning
                self.prune(retro_id).await;
                0
            }
        }
    }

    /// Drop the channel for `retro_id` if nobody listens anymore.
    pub async fn prune(&self, retro_id: Uuid) {
        let mut retros = self.inner.retros.write().await;
        if retros
            .get(&retro_id)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            retros.remove(&retro_id);
            debug!("Closed event channel for retrospective {}", retro_id);
        }
    }

    pub async fn subscriber_count(&self, retro_id: Uuid) -> usize {
        self.inner
            .retros
            .read()
            .await
            .get(&retro_id)
            .map_or(0, |tx| tx.receiver_count())
    }

    pub async fn open_channels(&self) -> usize {
        self.inner.retros.read().await.len()
    }
}
