//! Request dispatcher
//!
//! In-process publish/subscribe bus between the interception hook and its
//! consumers (the logger core, tools, tests).
//!
//! Every subscription owns a FIFO queue drained by a dedicated delivery
//! thread, so deliveries to one observer never overlap and follow publish
//! order, while a slow observer only delays itself. Publishes are serialized
//! by a publish lock; that lock defines the global order. An observer that
//! panics is isolated: the panic is caught and reported, and the observer
//! keeps receiving later requests.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::thread;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::Request;

static GLOBAL_DISPATCHER: Lazy<Arc<Dispatcher>> =
    Lazy::new(|| Arc::new(Dispatcher::new("global")));

/// Consumer of published requests.
pub trait RequestObserver: Send + Sync {
    fn on_request(&self, request: &Request);
}

impl<F> RequestObserver for F
where
    F: Fn(&Request) + Send + Sync,
{
    fn on_request(&self, request: &Request) {
        self(request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to spawn delivery worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

enum Delivery {
    Request(Arc<Request>),
    Flush(std_mpsc::Sender<()>),
}

struct Subscriber {
    queue: mpsc::UnboundedSender<Delivery>,
}

pub struct Dispatcher {
    name: String,
    subscribers: DashMap<SubscriptionId, Subscriber>,
    next_id: AtomicU64,
    publish_lock: Mutex<()>,
}

impl Dispatcher {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            publish_lock: Mutex::new(()),
        }
    }

    /// The process-wide dispatcher used by default hooks and loggers.
    pub fn global() -> Arc<Dispatcher> {
        Arc::clone(&GLOBAL_DISPATCHER)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscribe(
        &self,
        observer: Arc<dyn RequestObserver>,
    ) -> Result<SubscriptionId, DispatchError> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = mpsc::unbounded_channel();
        spawn_worker(&self.name, id, observer, rx)?;
        self.subscribers.insert(id, Subscriber { queue: tx });
        tracing::debug!("Dispatcher '{}': {} subscribed", self.name, id);
        Ok(id)
    }

    /// Detach a subscriber. Requests already queued for it may still be
    /// delivered; nothing published afterwards is.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            tracing::debug!("Dispatcher '{}': {} unsubscribed", self.name, id);
        }
        removed
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.subscribers.contains_key(&id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Queue `request` for every current subscriber. Returns how many
    /// subscribers it was queued for. Never blocks on observers.
    pub fn publish(&self, request: Request) -> usize {
        let request = Arc::new(request);
        let _order = self
            .publish_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut delivered = 0;
        for entry in self.subscribers.iter() {
            if entry
                .value()
                .queue
                .send(Delivery::Request(Arc::clone(&request)))
                .is_ok()
            {
                delivered += 1;
            } else {
                tracing::warn!(
                    "Dispatcher '{}': delivery worker for {} is gone",
                    self.name,
                    entry.key()
                );
            }
        }
        delivered
    }

    /// Block until everything published before this call has been handed to
    /// its observers. Must not be called from inside an observer.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = std_mpsc::channel();
        let mut pending = 0;
        {
            let _order = self
                .publish_lock
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            for entry in self.subscribers.iter() {
                if entry
                    .value()
                    .queue
                    .send(Delivery::Flush(ack_tx.clone()))
                    .is_ok()
                {
                    pending += 1;
                }
            }
        }
        drop(ack_tx);
        for _ in 0..pending {
            if ack_rx.recv().is_err() {
                break;
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.name)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

fn spawn_worker(
    dispatcher: &str,
    id: SubscriptionId,
    observer: Arc<dyn RequestObserver>,
    mut queue: mpsc::UnboundedReceiver<Delivery>,
) -> Result<(), DispatchError> {
    let dispatcher = dispatcher.to_string();
    thread::Builder::new()
        .name(format!("netlog-dispatch-{}", id.0))
        .spawn(move || {
            while let Some(delivery) = queue.blocking_recv() {
                match delivery {
                    Delivery::Request(request) => {
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                            observer.on_request(&request)
                        }));
                        if let Err(payload) = outcome {
                            tracing::error!(
                                "Dispatcher '{}': observer {} failed on {}: {}",
                                dispatcher,
                                id,
                                request.url,
                                panic_message(payload.as_ref())
                            );
                        }
                    }
                    Delivery::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
            tracing::trace!("Dispatcher '{}': worker for {} exited", dispatcher, id);
        })?;
    Ok(())
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
