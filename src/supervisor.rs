//! Transport lifecycle: dialing on demand, liveness tracking, the outbound
//! request queue, and the background sync loop.
//!
//! One sync loop task runs per live connection. It multiplexes the outbound
//! command channel and the transport receive side with `tokio::select!`,
//! decodes inbound frames into [`ServerEvent`]s, and hands them to the
//! [`EventRouter`] in arrival order. However the loop exits (server close,
//! transport error, client shutdown), it clears the `connected` flag,
//! detaches the outbound queue and emits a final `Disconnected` event.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::error::{Result, WordSpyError};
use crate::event::{notify, notify_disconnected, WordSpyEvent};
use crate::protocol::{ClientRequest, ServerEvent};
use crate::router::EventRouter;
use crate::transport::{BoxTransport, Connector};

/// Poll interval of [`ConnectionSupervisor::await_connected`].
pub(crate) const CONNECT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default budget for waiting on transport readiness.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a graceful shutdown may take before the loop task is aborted.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Outbound queue ──────────────────────────────────────────────────

/// Cloneable handle for queueing requests to whichever sync loop is live.
///
/// The slot is shared between the supervisor (which attaches a fresh sender
/// per connection) and the reconciler (which emits refresh requests). Each
/// attachment carries a generation number: an exiting sync loop only clears
/// the slot for its own generation, so a reconnect that lands between a
/// stale loop's last poll and its teardown keeps its sender.
#[derive(Clone, Default)]
pub(crate) struct Outbound {
    slot: Arc<StdMutex<Slot>>,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    tx: Option<mpsc::UnboundedSender<ClientRequest>>,
}

impl Outbound {
    /// Install a new sender, returning the generation that owns it.
    pub(crate) fn attach(&self, tx: mpsc::UnboundedSender<ClientRequest>) -> u64 {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.generation += 1;
        slot.tx = Some(tx);
        slot.generation
    }

    fn detach(&self) {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).tx = None;
    }

    /// Clear the sender only while `generation` still owns the slot.
    fn detach_if(&self, generation: u64) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.generation == generation {
            slot.tx = None;
        }
    }

    /// Queue a request frame.
    ///
    /// # Errors
    ///
    /// Returns [`WordSpyError::NotConnected`] when no sync loop is attached.
    pub(crate) fn emit(&self, request: ClientRequest) -> Result<()> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.tx.as_ref() {
            Some(tx) => tx.send(request).map_err(|_| WordSpyError::NotConnected),
            None => Err(WordSpyError::NotConnected),
        }
    }
}

// ── Supervisor ──────────────────────────────────────────────────────

/// Owns the transport lifecycle: connect-on-demand, the live `connected`
/// predicate, and graceful teardown.
pub struct ConnectionSupervisor {
    connector: Arc<dyn Connector>,
    token: String,
    connected: Arc<AtomicBool>,
    dialing: AtomicBool,
    outbound: Outbound,
    task: StdMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ConnectionSupervisor {
    pub(crate) fn new(connector: Arc<dyn Connector>, token: String, outbound: Outbound) -> Self {
        Self {
            connector,
            token,
            connected: Arc::new(AtomicBool::new(false)),
            dialing: AtomicBool::new(false),
            outbound,
            task: StdMutex::new(None),
        }
    }

    /// Whether a sync loop is currently running over a live transport.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Dial and start a sync loop. Idempotent: a no-op while a connection is
    /// live or another dial is in flight.
    ///
    /// # Errors
    ///
    /// Returns the connector's error if the dial fails. Never retried here;
    /// the caller decides whether to try again.
    pub(crate) async fn connect(
        &self,
        router: EventRouter,
        events: mpsc::Sender<WordSpyEvent>,
    ) -> Result<()> {
        if self.is_connected() {
            debug!("connect requested while already connected, ignoring");
            return Ok(());
        }
        if self.dialing.swap(true, Ordering::AcqRel) {
            debug!("dial already in flight, ignoring");
            return Ok(());
        }
        let result = self.dial(router, events).await;
        self.dialing.store(false, Ordering::Release);
        result
    }

    async fn dial(&self, router: EventRouter, events: mpsc::Sender<WordSpyEvent>) -> Result<()> {
        let transport = self.connector.connect(&self.token).await?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ClientRequest>();
        let generation = self.outbound.attach(cmd_tx);
        self.connected.store(true, Ordering::Release);

        let task = tokio::spawn(sync_loop(
            transport,
            cmd_rx,
            router,
            Arc::clone(&self.connected),
            self.outbound.clone(),
            generation,
            events,
        ));

        let mut slot = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(stale) = slot.replace(task) {
            // A previous loop already exited (connected was false); make sure
            // its task cannot linger.
            stale.abort();
        }
        Ok(())
    }

    /// Wait until [`is_connected`](Self::is_connected) holds, polling every
    /// 100 ms.
    ///
    /// # Errors
    ///
    /// Returns [`WordSpyError::ConnectionTimeout`] once `timeout` elapses.
    /// Terminal for the waiting action — callers surface it, never loop.
    pub async fn await_connected(&self, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.is_connected() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(WordSpyError::ConnectionTimeout);
            }
            tokio::time::sleep(CONNECT_POLL_INTERVAL).await;
        }
    }

    /// Queue an outbound request to the live sync loop.
    pub(crate) fn emit(&self, request: ClientRequest) -> Result<()> {
        self.outbound.emit(request)
    }

    /// Tear the connection down: detaching the outbound queue closes the
    /// command channel, which makes the sync loop close the transport, emit
    /// the final `Disconnected` event, and exit. The task is awaited with a
    /// bounded timeout and aborted if it overruns.
    pub(crate) async fn shutdown(&self) {
        debug!("supervisor shutdown requested");
        self.outbound.detach();

        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut task) = task {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("sync loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("sync loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("sync loop aborted: {join_err}");
                    }
                }
            }
        }
        self.connected.store(false, Ordering::Release);
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        // No executor is available in Drop; aborting the task drops the loop
        // future, which is the only safe teardown here.
        if let Some(task) = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}

impl std::fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

// ── Sync loop ───────────────────────────────────────────────────────

/// Background loop for one connection.
///
/// Exits when:
/// - the command channel closes (supervisor shutdown / client dropped)
/// - the transport returns `None` (server closed the connection)
/// - a transport error occurs
async fn sync_loop(
    mut transport: BoxTransport,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientRequest>,
    mut router: EventRouter,
    connected: Arc<AtomicBool>,
    outbound: Outbound,
    generation: u64,
    events: mpsc::Sender<WordSpyEvent>,
) {
    debug!("sync loop started");
    notify(&events, WordSpyEvent::Connected);

    let reason = loop {
        tokio::select! {
            // Branch 1: outbound request from the client handle.
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(request) => {
                        debug!("sending request: {:?}", std::mem::discriminant(&request));
                        match serde_json::to_string(&request) {
                            Ok(json) => {
                                if let Err(e) = transport.send(json).await {
                                    error!("transport send error: {e}");
                                    break Some(format!("transport send error: {e}"));
                                }
                            }
                            Err(e) => {
                                // A request that cannot serialize is a
                                // programming bug; don't kill the loop.
                                error!("failed to serialize request: {e}");
                            }
                        }
                    }
                    None => {
                        debug!("command channel closed, shutting down sync loop");
                        let _ = transport.close().await;
                        break Some("client shut down".to_string());
                    }
                }
            }

            // Branch 2: inbound frame from the server.
            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        match serde_json::from_str::<ServerEvent>(&text) {
                            Ok(event) => {
                                router.dispatch(event);
                            }
                            Err(e) => {
                                warn!("failed to deserialize server event: {e} (raw: {text})");
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        break Some(format!("transport receive error: {e}"));
                    }
                    None => {
                        debug!("transport closed by server");
                        break None;
                    }
                }
            }
        }
    };

    connected.store(false, Ordering::Release);
    // Only this loop's own attachment may be cleared; a reconnect can have
    // installed a fresh sender before this teardown runs.
    outbound.detach_if(generation);
    notify_disconnected(&events, reason).await;
    debug!("sync loop exited");
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use crate::transport::Transport;

    /// Transport that never yields a frame and records nothing.
    struct SilentTransport;

    #[async_trait]
    impl Transport for SilentTransport {
        async fn send(&mut self, _message: String) -> Result<()> {
            Ok(())
        }
        async fn recv(&mut self) -> Option<Result<String>> {
            std::future::pending().await
        }
        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    /// Connector that counts dials and hands out silent transports.
    struct CountingConnector {
        dials: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connector for CountingConnector {
        async fn connect(&self, _token: &str) -> Result<BoxTransport> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(SilentTransport))
        }
    }

    /// Connector whose dial always fails.
    struct RefusingConnector;

    #[async_trait]
    impl Connector for RefusingConnector {
        async fn connect(&self, _token: &str) -> Result<BoxTransport> {
            Err(WordSpyError::TransportReceive("refused".into()))
        }
    }

    fn supervisor(connector: Arc<dyn Connector>) -> ConnectionSupervisor {
        ConnectionSupervisor::new(connector, "tok".into(), Outbound::default())
    }

    #[test]
    fn stale_generation_cannot_detach_newer_sender() {
        let outbound = Outbound::default();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let old = outbound.attach(tx1);

        // A reconnect replaced the sender before the old loop tore down.
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let current = outbound.attach(tx2);
        outbound.detach_if(old);

        outbound
            .emit(ClientRequest::TypingStart {
                room_code: "ABCD".into(),
            })
            .unwrap();
        assert!(rx2.try_recv().is_ok());

        // The live generation still detaches itself.
        outbound.detach_if(current);
        assert!(matches!(
            outbound.emit(ClientRequest::TypingStop {
                room_code: "ABCD".into(),
            }),
            Err(WordSpyError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn await_connected_times_out_when_never_connected() {
        let sup = supervisor(Arc::new(RefusingConnector));
        let err = sup
            .await_connected(Duration::from_millis(150))
            .await
            .unwrap_err();
        assert!(matches!(err, WordSpyError::ConnectionTimeout));
    }

    #[tokio::test]
    async fn emit_without_connection_fails() {
        let sup = supervisor(Arc::new(RefusingConnector));
        let err = sup
            .emit(ClientRequest::TypingStop {
                room_code: "ABCD".into(),
            })
            .unwrap_err();
        assert!(matches!(err, WordSpyError::NotConnected));
    }

    #[tokio::test]
    async fn connect_is_idempotent_while_connected() {
        let dials = Arc::new(AtomicUsize::new(0));
        let sup = supervisor(Arc::new(CountingConnector {
            dials: Arc::clone(&dials),
        }));
        let (tx, _rx) = mpsc::channel(8);

        sup.connect(EventRouter::new(), tx.clone()).await.unwrap();
        assert!(sup.is_connected());
        sup.connect(EventRouter::new(), tx).await.unwrap();
        assert_eq!(dials.load(Ordering::SeqCst), 1);

        sup.shutdown().await;
    }

    #[tokio::test]
    async fn dial_failure_propagates_and_stays_disconnected() {
        let sup = supervisor(Arc::new(RefusingConnector));
        let (tx, _rx) = mpsc::channel(8);
        let err = sup.connect(EventRouter::new(), tx).await.unwrap_err();
        assert!(matches!(err, WordSpyError::TransportReceive(_)));
        assert!(!sup.is_connected());
    }

    #[tokio::test]
    async fn shutdown_emits_final_disconnected() {
        let dials = Arc::new(AtomicUsize::new(0));
        let sup = supervisor(Arc::new(CountingConnector { dials }));
        let (tx, mut rx) = mpsc::channel(8);

        sup.connect(EventRouter::new(), tx).await.unwrap();
        let first = rx.recv().await.unwrap();
        assert_eq!(first, WordSpyEvent::Connected);

        sup.shutdown().await;
        assert!(!sup.is_connected());

        let last = rx.recv().await.unwrap();
        assert!(matches!(last, WordSpyEvent::Disconnected { .. }));
    }
}
