use super::{
    kind::OperationType,
    params::{operate_url, OperationParams},
    reducer::{self, OperationState, RenderEffect, StreamEvent},
    region::Regions,
};
use crate::stream::{EventSourceConnector, EventStream, TransportError};
use futures::StreamExt;
use std::{
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
};

/// A live event stream of one operation type.
struct ConnectionHandle {
    /// Used to send the close signal to the pump task.
    ///
    /// Dropping the handle closes the connection as well.
    tx: mpsc::Sender<()>,
    join: JoinHandle<()>,
    generation: u64,
}

impl ConnectionHandle {
    /// Closes the stream and waits until the pump task let go of it.
    #[tracing::instrument(name = "close", skip_all, fields(generation = self.generation))]
    async fn close(self) {
        if self.tx.send(()).await.is_err() {
            tracing::debug!("Pump already finished");
        }

        if let Err(err) = self.join.await {
            tracing::warn!(?err, "Pump task failed");
        }
    }
}

#[derive(Default)]
struct Slot {
    /// Bumped on every start. Events of older generations are discarded.
    generation: u64,
    connection: Option<ConnectionHandle>,
    /// Bumped on every status change. A pending hide only applies to its own status.
    status_epoch: u64,
    status_timer: Option<JoinHandle<()>>,
}

impl Slot {
    fn cancel_status_timer(&mut self) {
        self.status_epoch += 1;

        if let Some(timer) = self.status_timer.take() {
            timer.abort();
        }
    }
}

struct ControllerInner {
    base_url: String,
    connector: Arc<dyn EventSourceConnector>,
    regions: Regions,
    slots: Mutex<[Slot; OperationType::COUNT]>,
    states: [watch::Sender<OperationState>; OperationType::COUNT],
}

/// Owns one connection slot per [`OperationType`] and renders every stream
/// into the region registered for its type.
///
/// Cloning is cheap. When the last clone is dropped every open connection is closed.
#[derive(Clone)]
pub struct OperationController {
    inner: Arc<ControllerInner>,
}

impl OperationController {
    pub fn new(
        base_url: impl Into<String>,
        connector: Arc<dyn EventSourceConnector>,
        regions: Regions,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                base_url: base_url.into(),
                connector,
                regions,
                slots: Mutex::new(std::array::from_fn(|_| Slot::default())),
                states: std::array::from_fn(|_| watch::channel(OperationState::Idle).0),
            }),
        }
    }

    /// Starts a new operation of `ty`, replacing the one currently running for that type.
    ///
    /// Initialization failures are rendered into the status region of `ty`.
    #[tracing::instrument(name = "start", skip(self, params), fields(ty = %ty))]
    pub async fn start(&self, ty: OperationType, script: &str, params: &OperationParams) {
        let (generation, superseded) = {
            let mut slots = self.inner.slots.lock().await;
            let slot = &mut slots[ty.index()];

            slot.generation += 1;

            let (state, effects) = reducer::begin(ty);
            self.inner.apply(ty, slot, effects);
            self.inner.states[ty.index()].send_replace(state);

            (slot.generation, slot.connection.take())
        };

        if let Some(connection) = superseded {
            tracing::info!("Closing superseded connection");

            connection.close().await;
        }

        let events = operate_url(&self.inner.base_url, script, params)
            .and_then(|url| self.inner.connector.connect(url));

        let events = match events {
            Ok(events) => events,
            Err(err) => {
                tracing::error!(%err, "Failed to initialize connection");

                self.inner
                    .dispatch(ty, generation, StreamEvent::InitFailed(err.to_string()))
                    .await;

                return;
            }
        };

        let mut slots = self.inner.slots.lock().await;
        let slot = &mut slots[ty.index()];

        if slot.generation != generation {
            tracing::debug!("Superseded while connecting");

            return;
        }

        let (tx, rx) = mpsc::channel(1);
        let join = tokio::spawn(pump(
            Arc::downgrade(&self.inner),
            ty,
            generation,
            events,
            rx,
        ));

        tracing::info!(generation, "Connection opened");

        slot.connection = Some(ConnectionHandle {
            tx,
            join,
            generation,
        });
    }

    /// Closes the connection of `ty`, if any. Its region is left as is.
    pub async fn close(&self, ty: OperationType) {
        let connection = {
            let mut slots = self.inner.slots.lock().await;
            let slot = &mut slots[ty.index()];

            slot.generation += 1;
            slot.connection.take()
        };

        if let Some(connection) = connection {
            connection.close().await;
        }
    }

    /// Closes every open connection and cancels pending status timers.
    pub async fn close_all(&self) {
        let connections = {
            let mut slots = self.inner.slots.lock().await;

            slots
                .iter_mut()
                .filter_map(|slot| {
                    slot.generation += 1;
                    slot.cancel_status_timer();
                    slot.connection.take()
                })
                .collect::<Vec<_>>()
        };

        tracing::info!(count = connections.len(), "Closing all connections");

        for connection in connections {
            connection.close().await;
        }
    }

    pub fn state(&self, ty: OperationType) -> OperationState {
        *self.inner.states[ty.index()].borrow()
    }

    pub fn subscribe(&self, ty: OperationType) -> watch::Receiver<OperationState> {
        self.inner.states[ty.index()].subscribe()
    }

    pub async fn is_connected(&self, ty: OperationType) -> bool {
        self.inner.slots.lock().await[ty.index()]
            .connection
            .is_some()
    }

    pub async fn open_connections(&self) -> usize {
        self.inner
            .slots
            .lock()
            .await
            .iter()
            .filter(|slot| slot.connection.is_some())
            .count()
    }
}

impl ControllerInner {
    /// Feeds one event through the reducer. Returns `false` once the connection is done.
    async fn dispatch(
        self: &Arc<Self>,
        ty: OperationType,
        generation: u64,
        event: StreamEvent,
    ) -> bool {
        let mut slots = self.slots.lock().await;
        let slot = &mut slots[ty.index()];

        if slot.generation != generation {
            tracing::debug!(generation, current = slot.generation, "Dropping stale event");

            return false;
        }

        let state = *self.states[ty.index()].borrow();
        let (state, effects) = reducer::reduce(ty, state, event);
        let keep_open = self.apply(ty, slot, effects);
        self.states[ty.index()].send_replace(state);

        keep_open
    }

    /// Regions are called with the slot lock held and must not block.
    fn apply(
        self: &Arc<Self>,
        ty: OperationType,
        slot: &mut Slot,
        effects: Vec<RenderEffect>,
    ) -> bool {
        let region = self.regions.get(ty);
        let mut keep_open = true;

        for effect in effects {
            match effect {
                RenderEffect::ClearOutput => region.clear(),
                RenderEffect::ShowStatus(status) => {
                    slot.cancel_status_timer();
                    region.show_status(&status.text, status.kind);

                    if let Some(after) = status.auto_hide {
                        slot.status_timer =
                            Some(self.schedule_hide(ty, slot.status_epoch, after));
                    }
                }
                RenderEffect::HideStatus => {
                    slot.cancel_status_timer();
                    region.hide_status();
                }
                RenderEffect::AppendTaskLine(line) => region.append_task_line(&line),
                RenderEffect::AppendStatistics(stats) => region.append_statistics(&stats),
                RenderEffect::AppendCompleted(message) => region.append_completed(&message),
                RenderEffect::AppendParseError { error, raw } => {
                    tracing::warn!(%error, %raw, "Failed to parse payload");

                    region.append_parse_error(&error, &raw);
                }
                RenderEffect::CloseConnection => {
                    tracing::info!("Connection closed");

                    slot.connection.take();
                    keep_open = false;
                }
            }
        }

        keep_open
    }

    fn schedule_hide(
        self: &Arc<Self>,
        ty: OperationType,
        epoch: u64,
        after: Duration,
    ) -> JoinHandle<()> {
        let inner = Arc::downgrade(self);

        tokio::spawn(async move {
            tokio::time::sleep(after).await;

            let Some(inner) = inner.upgrade() else {
                return;
            };

            let mut slots = inner.slots.lock().await;
            let slot = &mut slots[ty.index()];

            if slot.status_epoch == epoch {
                slot.status_timer = None;
                inner.regions.get(ty).hide_status();
            }
        })
    }
}

#[tracing::instrument(name = "pump", skip_all, fields(ty = %ty, generation = generation))]
async fn pump(
    inner: Weak<ControllerInner>,
    ty: OperationType,
    generation: u64,
    mut events: EventStream,
    mut close_signal: mpsc::Receiver<()>,
) {
    loop {
        let event = tokio::select! {
            biased;

            _ = close_signal.recv() => {
                tracing::debug!("Received close signal");

                break;
            }
            item = events.next() => match item {
                Some(Ok(data)) => {
                    tracing::trace!(%data, "Payload received");

                    StreamEvent::Payload {
                        data,
                        received_at: chrono::Local::now().time(),
                    }
                }
                Some(Err(err)) => {
                    tracing::warn!(%err, "Stream failed");

                    StreamEvent::TransportError(err.to_string())
                }
                None => {
                    tracing::warn!("Stream ended before completion");

                    StreamEvent::TransportError(TransportError::Closed.to_string())
                }
            },
        };

        let Some(inner) = inner.upgrade() else {
            break;
        };

        if !inner.dispatch(ty, generation, event).await {
            break;
        }
    }

    tracing::debug!("Pump finished");
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        tracing::trace!("Controller dropped. Open connections are closed with it");
    }
}
