type Notify = tokio::sync::broadcast::Receiver<()>;

/// Listens for the bridge shutdown signal.
///
/// Shutdown is signalled by dropping the `broadcast::Sender` held by the
/// server; every task carries its own `Shutdown` and exits its loop when
/// `recv` resolves.
#[derive(Debug)]
pub(crate) struct Shutdown {
    /// `true` if the shutdown signal has been received
    shutdown: bool,

    /// The receive half of the channel used to listen for shutdown.
    notify: Notify,
}

impl Clone for Shutdown {
    fn clone(&self) -> Self {
        Self {
            shutdown: self.shutdown,
            notify: self.notify.resubscribe(),
        }
    }
}

impl Shutdown {
    pub(crate) fn new(notify: Notify) -> Shutdown {
        Shutdown {
            shutdown: false,
            notify,
        }
    }

    /// Returns `true` if the shutdown signal has been received.
    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Receive the shutdown notice, waiting if necessary.
    pub(crate) async fn recv(&mut self) {
        if self.is_shutdown() {
            return;
        }

        // Any result counts: a value or a closed channel both mean "stop".
        let _ = self.notify.recv().await;

        self.shutdown = true;
    }
}

impl From<Notify> for Shutdown {
    fn from(notify: Notify) -> Self {
        Self::new(notify)
    }
}
