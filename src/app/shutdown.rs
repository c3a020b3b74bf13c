use crate::sender::AsyncTransport;
use crate::worker::ShutdownReport;
use super::AsyncQuotientAI;
use tokio::signal;
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal as unix_signal};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
    /// Raised through a [`ShutdownTrigger`] rather than the OS.
    Manual,
}

/// Requests a drain without an OS signal.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: mpsc::UnboundedSender<ShutdownSignal>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        if self.tx.send(ShutdownSignal::Manual).is_err() {
            warn!("Shutdown channel already closed");
        }
    }
}

/// Listens for SIGINT/SIGTERM (ctrl-c elsewhere) and drains async log
/// delivery before the host process exits.
#[derive(Debug)]
pub struct SignalHandler {
    tx: mpsc::UnboundedSender<ShutdownSignal>,
    rx: mpsc::UnboundedReceiver<ShutdownSignal>,
}

impl SignalHandler {
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = Self { tx, rx };
        handler.setup_handlers();
        handler
    }

    fn setup_handlers(&self) {
        let tx = self.tx.clone();

        tokio::spawn(async move {
            #[cfg(unix)]
            {
                let mut sigterm = match unix_signal(SignalKind::terminate()) {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        error!(error = %e, "Failed to create SIGTERM handler");
                        return;
                    }
                };

                let received = tokio::select! {
                    result = signal::ctrl_c() => match result {
                        Ok(()) => {
                            info!("Received SIGINT, draining log delivery");
                            ShutdownSignal::Interrupt
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to listen for SIGINT");
                            return;
                        }
                    },
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, draining log delivery");
                        ShutdownSignal::Terminate
                    }
                };

                if tx.send(received).is_err() {
                    error!("Failed to send shutdown signal");
                }
            }

            #[cfg(not(unix))]
            {
                match signal::ctrl_c().await {
                    Ok(()) => {
                        info!("Received ctrl-c, draining log delivery");
                        if tx.send(ShutdownSignal::Interrupt).is_err() {
                            error!("Failed to send shutdown signal");
                        }
                    }
                    Err(e) => error!(error = %e, "Failed to listen for ctrl-c"),
                }
            }
        });
    }

    pub fn trigger(&self) -> ShutdownTrigger {
        ShutdownTrigger { tx: self.tx.clone() }
    }

    pub async fn wait(&mut self) -> Option<ShutdownSignal> {
        self.rx.recv().await
    }

    /// Waits for the first signal, then drains the client's log delivery.
    pub async fn drain_on_signal<T: AsyncTransport + 'static>(
        mut self,
        client: &AsyncQuotientAI<T>,
    ) -> (ShutdownSignal, ShutdownReport) {
        let received = self.wait().await.unwrap_or(ShutdownSignal::Manual);
        let report = client.shutdown().await;
        if !report.drained {
            warn!(abandoned = report.abandoned, "Log delivery did not fully drain before exit");
        }
        (received, report)
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}
