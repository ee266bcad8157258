use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio::sync::{mpsc, oneshot};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Flush(oneshot::Sender<()>),
}

/// Handle to the delivery task
///
/// Clones share the same task. The task ends once every handle is dropped
/// and the queue has drained.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Message>,
}

impl Dispatcher {
    /// Spawn the delivery task
    ///
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    Message::Run(job) => isolate(job),
                    Message::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            tracing::trace!("Dispatcher stopped");
        });

        Self { tx }
    }

    /// Queue a job behind everything posted so far
    pub fn post<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(Message::Run(Box::new(job))).is_err() {
            tracing::debug!("Dispatcher gone, dropping callback");
        }
    }

    /// Wait until every job posted before this call has run
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Message::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

/// Run one callback, containing a panic so later callbacks still run
pub(crate) fn isolate<F: FnOnce()>(callback: F) {
    if catch_unwind(AssertUnwindSafe(callback)).is_err() {
        tracing::warn!("Listener callback panicked");
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}
