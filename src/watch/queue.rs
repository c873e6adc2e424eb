//! # Channel Work Queue
//!
//! [`WorkQueue`] backed by an unbounded tokio channel. The receiving half is
//! handed to whatever drives reconciles (a `kube_runtime::Controller` via
//! `reconcile_on`, or a plain worker loop).

use crate::watch::registry::ObjectKey;
use crate::watch::router::WorkQueue;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ChannelWorkQueue {
    tx: UnboundedSender<ObjectKey>,
}

impl ChannelWorkQueue {
    #[must_use]
    pub fn new() -> (Self, UnboundedReceiver<ObjectKey>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl WorkQueue for ChannelWorkQueue {
    fn enqueue(&self, key: ObjectKey) {
        if let Err(e) = self.tx.send(key) {
            // Receiver gone means the process is shutting down
            warn!(
                resource.namespace = %e.0.namespace,
                resource.name = %e.0.name,
                "Work queue closed, dropping reconcile request"
            );
        }
    }
}
