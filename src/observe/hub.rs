use std::sync::{Arc, Mutex};
use tokio::{sync::oneshot, task};
use tracing::warn;

use super::sink::{NoticeSink, StdOutSink};
use super::ChangeNotice;

/// Receives change notices and broadcasts them to multiple sinks from a
/// background listener task.
///
/// The sender side is handed to a
/// [`StreamAccumulator`](crate::accumulator::StreamAccumulator) through
/// `with_notifier`; the hub owns the receiving end.
pub struct ChangeHub {
    sinks: Arc<Mutex<Vec<Box<dyn NoticeSink>>>>,
    channel: (flume::Sender<ChangeNotice>, flume::Receiver<ChangeNotice>),
    listener: Arc<Mutex<Option<ListenerState>>>,
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::with_sink(StdOutSink::default())
    }
}

impl ChangeHub {
    /// Create a hub with a single sink.
    pub fn with_sink<T>(sink: T) -> Self
    where
        T: NoticeSink + 'static,
    {
        Self {
            sinks: Arc::new(Mutex::new(vec![Box::new(sink)])),
            channel: flume::unbounded(),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a hub with multiple sinks.
    pub fn with_sinks(sinks: Vec<Box<dyn NoticeSink>>) -> Self {
        Self {
            sinks: Arc::new(Mutex::new(sinks)),
            channel: flume::unbounded(),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Dynamically add a sink (useful for per-request streaming).
    pub fn add_sink<T: NoticeSink + 'static>(&self, sink: T) {
        self.sinks.lock().unwrap().push(Box::new(sink));
    }

    /// Clone of the sender side, for wiring into an accumulator.
    pub fn sender(&self) -> flume::Sender<ChangeNotice> {
        self.channel.0.clone()
    }

    /// Spawn the background listener that broadcasts notices to all sinks.
    /// Idempotent: calling multiple times has no effect.
    pub fn listen(&self) {
        let mut guard = self.listener.lock().expect("listener poisoned");
        if guard.is_some() {
            return;
        }

        let receiver = self.channel.1.clone();
        let sinks = self.sinks.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = task::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    recv = receiver.recv_async() => match recv {
                        Err(_) => break,
                        Ok(notice) => {
                            let mut sinks_guard = sinks.lock().unwrap();
                            for sink in sinks_guard.iter_mut() {
                                if let Err(e) = sink.handle(&notice) {
                                    warn!(error = %e, "change sink failed");
                                }
                            }
                        }
                    }
                }
            }
        });

        *guard = Some(ListenerState {
            shutdown_tx,
            handle,
        });
    }

    /// Stop the background listener, draining nothing further.
    pub async fn stop(&self) {
        let state = {
            let mut guard = self.listener.lock().expect("listener poisoned");
            guard.take()
        };
        if let Some(state) = state {
            let _ = state.shutdown_tx.send(());
            let _ = state.handle.await;
        }
    }
}

impl Drop for ChangeHub {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.listener.lock() {
            if let Some(state) = guard.take() {
                let _ = state.shutdown_tx.send(());
                state.handle.abort();
            }
        }
    }
}

struct ListenerState {
    shutdown_tx: oneshot::Sender<()>,
    handle: task::JoinHandle<()>,
}
