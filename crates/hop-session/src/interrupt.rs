//! Ctrl+C delivery for code that needs to race it against other work.
//!
//! A single background task owns the signal registration and bumps a
//! counter on a `watch` channel; every clone of [`Interrupt`] can wait for
//! the next bump independently.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Interrupt {
    rx: watch::Receiver<u64>,
}

/// Test-side handle that fires an [`Interrupt`] without a signal.
#[derive(Debug, Clone)]
pub struct InterruptTrigger {
    tx: Arc<watch::Sender<u64>>,
}

impl InterruptTrigger {
    pub fn fire(&self) {
        self.tx.send_modify(|n| *n += 1);
    }
}

impl Interrupt {
    /// Listen for Ctrl+C. Must be called from within a tokio runtime.
    pub fn ctrl_c() -> Self {
        let (tx, rx) = watch::channel(0u64);
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("cannot listen for Ctrl+C: {e}");
                    return;
                }
                info!("interrupt received");
                tx.send_modify(|n| *n += 1);
            }
        });
        Self { rx }
    }

    /// An interrupt fired only through the returned trigger.
    pub fn manual() -> (InterruptTrigger, Self) {
        let (tx, rx) = watch::channel(0u64);
        (InterruptTrigger { tx: Arc::new(tx) }, Self { rx })
    }

    /// Forget any interrupt delivered before now.
    pub fn clear(&mut self) {
        self.rx.borrow_and_update();
    }

    /// Resolve at the next interrupt. Never resolves if the source is gone.
    pub async fn triggered(&mut self) {
        if self.rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
