use std::collections::HashMap;
use std::sync::Arc;

use lookout_types::events::{GatewayEvent, MessageEvent};
use lookout_types::{GuildId, UserId};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use crate::relay::RelayEngine;

/// Events buffered per guild before `dispatch` starts waiting.
const GUILD_QUEUE_CAPACITY: usize = 1024;

/// Routes gateway events to the relay engine.
///
/// Each guild gets a single consumer that reads its events in delivery order.
/// Messages from watched users are handed to one sequential worker per user,
/// so a slow forward for one user never holds up another while each user's
/// messages stay in order. Nothing is processed until the watchlist cache is
/// ready; events arriving earlier wait in the guild queue.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    engine: Arc<RelayEngine>,

    /// Per-guild event queues: guild_id -> sender
    guild_queues: parking_lot::Mutex<HashMap<GuildId, mpsc::Sender<GatewayEvent>>>,

    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new(engine: Arc<RelayEngine>) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                engine,
                guild_queues: parking_lot::Mutex::new(HashMap::new()),
                tracker: TaskTracker::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Queue an event for its guild. Events without a guild are dropped.
    pub async fn dispatch(&self, event: GatewayEvent) {
        if self.inner.shutdown.is_cancelled() {
            debug!("Dropping gateway event received during shutdown");
            return;
        }
        let Some(guild_id) = event.guild_id() else {
            return;
        };

        let leaving = matches!(event, GatewayEvent::GuildRemoved { .. });
        let queue = self.guild_queue(guild_id);
        if queue.send(event).await.is_err() {
            warn!("Event queue for guild {} is closed, dropping event", guild_id);
        }

        if leaving {
            // The worker drains what is queued and exits once the sender is gone.
            self.inner.guild_queues.lock().remove(&guild_id);
        }
    }

    /// Stop accepting events and wait for queued and in-flight relays to finish.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.guild_queues.lock().clear();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        info!("Dispatcher drained");
    }

    fn guild_queue(&self, guild_id: GuildId) -> mpsc::Sender<GatewayEvent> {
        let mut queues = self.inner.guild_queues.lock();
        if let Some(queue) = queues.get(&guild_id) {
            if !queue.is_closed() {
                return queue.clone();
            }
        }

        let (tx, rx) = mpsc::channel(GUILD_QUEUE_CAPACITY);
        self.inner.tracker.spawn(run_guild_queue(
            self.inner.engine.clone(),
            guild_id,
            rx,
            self.inner.tracker.clone(),
            self.inner.shutdown.clone(),
        ));
        queues.insert(guild_id, tx.clone());
        debug!("Started event queue for guild {}", guild_id);
        tx
    }
}

async fn run_guild_queue(
    engine: Arc<RelayEngine>,
    guild_id: GuildId,
    mut rx: mpsc::Receiver<GatewayEvent>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
) {
    tokio::select! {
        biased;
        _ = engine.cache().wait_ready() => {}
        _ = shutdown.cancelled() => {
            debug!("Shut down before the watchlist was ready, guild {} queue discarded", guild_id);
            return;
        }
    }

    // Per-user sequential workers: user_id -> sender
    let mut users: HashMap<UserId, mpsc::UnboundedSender<MessageEvent>> = HashMap::new();

    while let Some(event) = rx.recv().await {
        match event {
            GatewayEvent::GuildAvailable { .. } => {
                if let Err(e) = engine.cache().ensure_loaded(guild_id).await {
                    warn!("Failed to load watchlist for guild {}: {}", guild_id, e);
                }
            }
            GatewayEvent::GuildRemoved { .. } => {
                users.clear();
                engine.cache().forget_guild(guild_id);
            }
            GatewayEvent::ChannelDelete { channel_id, .. } => {
                let engine = engine.clone();
                tracker.spawn(async move {
                    if let Err(e) = engine.cache().evict_channel(guild_id, channel_id).await {
                        warn!("Failed to evict deleted channel {}: {}", channel_id, e);
                    }
                });
            }
            GatewayEvent::MessageCreate(message) => {
                let author = message.author.id;
                if engine.cache().get(guild_id, author).is_none() {
                    // Lets a finished worker wind down once its queue is empty.
                    users.remove(&author);
                    continue;
                }

                let worker = users
                    .entry(author)
                    .or_insert_with(|| spawn_user_worker(&engine, &tracker));
                if let Err(mpsc::error::SendError(message)) = worker.send(message) {
                    let fresh = spawn_user_worker(&engine, &tracker);
                    let _ = fresh.send(message);
                    users.insert(author, fresh);
                }
            }
        }
    }

    debug!("Event queue for guild {} closed", guild_id);
}

fn spawn_user_worker(
    engine: &Arc<RelayEngine>,
    tracker: &TaskTracker,
) -> mpsc::UnboundedSender<MessageEvent> {
    let (tx, mut rx) = mpsc::unbounded_channel::<MessageEvent>();
    let engine = engine.clone();

    tracker.spawn(async move {
        while let Some(message) = rx.recv().await {
            let outcome = engine.handle_message(&message).await;
            trace!("Message {} from {}: {:?}", message.id, message.author.id, outcome);
        }
    });

    tx
}
