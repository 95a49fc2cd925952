//! Per-room event workers.
//!
//! Events from one room are handled strictly in arrival order; different rooms
//! proceed concurrently. Shared state is only touched through the registry.
//! A worker with nothing to do for [`ROOM_IDLE_TIMEOUT`] exits and is dropped
//! from the table, so rooms the bot has left do not pin a task.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{dispatch::Dispatcher, domain::ChannelName, messaging::types::ChatEvent};

/// How long a room worker waits for its next event before exiting.
pub const ROOM_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

struct RoomWorker {
    tx: UnboundedSender<ChatEvent>,
    handle: JoinHandle<()>,
}

struct ChannelWorkers {
    dispatcher: Arc<Dispatcher>,
    idle: Duration,
    rooms: HashMap<ChannelName, RoomWorker>,
}

impl ChannelWorkers {
    fn new(dispatcher: Arc<Dispatcher>, idle: Duration) -> Self {
        Self {
            dispatcher,
            idle,
            rooms: HashMap::new(),
        }
    }

    fn submit(&mut self, ev: ChatEvent) {
        let channel = ev.channel.clone();
        let ev = match self.rooms.get(&channel) {
            Some(worker) => match worker.tx.send(ev) {
                Ok(()) => return,
                // Idle exit or a panicked handler closed the queue.
                Err(mpsc::error::SendError(ev)) => {
                    debug!(channel = %channel, "room worker closed, starting a new one");
                    ev
                }
            },
            None => ev,
        };

        let previous = self.rooms.remove(&channel).map(|w| w.handle);
        self.prune();
        let worker = self.spawn(channel.clone(), previous);
        if worker.tx.send(ev).is_err() {
            warn!(channel = %channel, "room worker rejected event");
        }
        self.rooms.insert(channel, worker);
    }

    /// Forget workers that have already exited.
    fn prune(&mut self) {
        let before = self.rooms.len();
        self.rooms.retain(|_, w| !w.handle.is_finished());
        let pruned = before - self.rooms.len();
        if pruned > 0 {
            debug!(pruned, active = self.rooms.len(), "dropped finished room workers");
        }
    }

    /// A successor starts only after `previous` has drained, keeping room order.
    fn spawn(&self, channel: ChannelName, previous: Option<JoinHandle<()>>) -> RoomWorker {
        let (tx, rx) = mpsc::unbounded_channel::<ChatEvent>();
        let dispatcher = self.dispatcher.clone();
        let idle = self.idle;
        debug!(channel = %channel, "starting room worker");
        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                if let Err(e) = previous.await {
                    warn!(channel = %channel, error = %e, "room worker ended abnormally");
                }
            }
            serve_room(&dispatcher, &channel, rx, idle).await;
        });
        RoomWorker { tx, handle }
    }

    /// Close every queue and wait for pending events to drain.
    async fn shutdown(self) {
        let handles: Vec<_> = self.rooms.into_values().map(|w| w.handle).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "room worker ended abnormally");
            }
        }
    }
}

async fn serve_room(
    dispatcher: &Dispatcher,
    channel: &ChannelName,
    mut rx: UnboundedReceiver<ChatEvent>,
    idle: Duration,
) {
    loop {
        match tokio::time::timeout(idle, rx.recv()).await {
            Ok(Some(ev)) => dispatcher.handle_event(&ev).await,
            Ok(None) => break,
            Err(_) => {
                // Refuse new events, then finish whatever raced in.
                rx.close();
                while let Ok(ev) = rx.try_recv() {
                    dispatcher.handle_event(&ev).await;
                }
                debug!(channel = %channel, "room worker idle, exiting");
                return;
            }
        }
    }
    debug!(channel = %channel, "room worker finished");
}

/// Feed `events` to `dispatcher` until the stream ends, then drain in-flight work.
pub async fn run_event_loop(dispatcher: Arc<Dispatcher>, mut events: mpsc::Receiver<ChatEvent>) {
    let mut workers = ChannelWorkers::new(dispatcher, ROOM_IDLE_TIMEOUT);
    while let Some(ev) = events.recv().await {
        workers.submit(ev);
    }
    info!("event stream closed");
    workers.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dispatch::BotIdentity,
        domain::UserId,
        registry::ChannelRegistry,
        replies,
        settings::ChannelSettings,
        test_support::{
            settings_with_channel, FakeBookmarks, FakeDirectory, FakeTransport, RecordingStore,
            TransportCall, BOT_NAME,
        },
    };

    fn event(channel: &str, sender: &str, text: &str) -> ChatEvent {
        ChatEvent {
            channel: ChannelName::new(channel),
            sender_id: UserId(sender.to_string()),
            sender_display_name: sender.to_string(),
            text: text.to_string(),
            is_moderator: false,
        }
    }

    /// Rooms are `(name, broadcaster id)` pairs.
    fn dispatcher(
        rooms: &[(&str, &str)],
        directory: FakeDirectory,
        transport: Arc<FakeTransport>,
    ) -> Arc<Dispatcher> {
        let (first, rest) = rooms.split_first().unwrap();
        let mut settings = settings_with_channel(first.0, first.1);
        for (name, id) in rest {
            let name = ChannelName::new(name);
            settings.channels.insert(
                name.as_str().to_string(),
                ChannelSettings::new(&name, &UserId(id.to_string())),
            );
        }
        let registry = Arc::new(ChannelRegistry::new(
            settings,
            Arc::new(RecordingStore::default()),
        ));
        Arc::new(Dispatcher::new(
            BotIdentity::new(BOT_NAME),
            registry,
            transport,
            Arc::new(directory),
            Arc::new(FakeBookmarks::default()),
            Vec::new(),
        ))
    }

    #[tokio::test]
    async fn events_in_one_room_are_handled_in_order() {
        let transport = Arc::new(FakeTransport::default());
        let dispatcher = dispatcher(
            &[("room", "100")],
            FakeDirectory::default(),
            transport.clone(),
        );

        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(run_event_loop(dispatcher, rx));
        for text in [
            "!markerbot mods enable",
            "!markerbot mods enable",
            "!markerbot mods disable",
        ] {
            tx.send(event("room", "100", text)).await.unwrap();
        }
        tx.send(event(BOT_NAME, "100", "ignored chatter"))
            .await
            .unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(
            transport.sent_to("room"),
            vec![
                replies::MODS_ENABLED.to_string(),
                replies::MODS_ALREADY_ENABLED.to_string(),
                replies::MODS_DISABLED.to_string(),
            ]
        );
        assert!(transport.sent_to(BOT_NAME).is_empty());
    }

    #[tokio::test]
    async fn slow_room_does_not_hold_up_other_rooms() {
        let transport = Arc::new(FakeTransport::default());
        let directory = FakeDirectory::default().slow_live(Duration::from_millis(100));
        let dispatcher = dispatcher(&[("a", "100"), ("b", "200")], directory, transport.clone());

        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(run_event_loop(dispatcher, rx));
        tx.send(event("a", "100", "!marker boss fight")).await.unwrap();
        tx.send(event("b", "200", "!markerbot mods enable"))
            .await
            .unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(
            transport.calls(),
            vec![
                TransportCall::Send("b".into(), replies::MODS_ENABLED.into()),
                TransportCall::Send("a".into(), replies::marker_not_live("100")),
            ]
        );
    }

    #[tokio::test]
    async fn room_keeps_working_after_a_handler_panics() {
        let transport = Arc::new(FakeTransport::default());
        let directory = FakeDirectory::default().panicking_on("boom");
        let dispatcher = dispatcher(&[("room", "100")], directory, transport.clone());

        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(run_event_loop(dispatcher, rx));
        tx.send(event("room", "100", "!markerbot add boom"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(event("room", "100", "!markerbot mods enable"))
            .await
            .unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(
            transport.sent_to("room"),
            vec![replies::MODS_ENABLED.to_string()]
        );
    }

    #[tokio::test]
    async fn closing_the_stream_drains_every_room() {
        let transport = Arc::new(FakeTransport::default());
        let directory = FakeDirectory::default().slow_live(Duration::from_millis(20));
        let rooms = [("a", "100"), ("b", "200"), ("c", "300")];
        let dispatcher = dispatcher(&rooms, directory, transport.clone());

        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(run_event_loop(dispatcher, rx));
        for (room, owner) in rooms {
            tx.send(event(room, owner, "!marker intro")).await.unwrap();
            tx.send(event(room, owner, "!markerbot mods enable"))
                .await
                .unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        for (room, owner) in rooms {
            assert_eq!(
                transport.sent_to(room),
                vec![
                    replies::marker_not_live(owner),
                    replies::MODS_ENABLED.to_string(),
                ]
            );
        }
    }

    #[tokio::test]
    async fn idle_workers_exit_and_are_forgotten() {
        let transport = Arc::new(FakeTransport::default());
        let dispatcher = dispatcher(
            &[("a", "100"), ("b", "200")],
            FakeDirectory::default(),
            transport.clone(),
        );
        let mut workers = ChannelWorkers::new(dispatcher, Duration::from_millis(20));

        workers.submit(event("a", "100", "!markerbot mods enable"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        workers.submit(event("b", "200", "!markerbot mods enable"));
        assert_eq!(
            workers.rooms.keys().cloned().collect::<Vec<_>>(),
            vec![ChannelName::new("b")]
        );

        workers.submit(event("a", "100", "!markerbot mods disable"));
        workers.shutdown().await;

        assert_eq!(
            transport.sent_to("a"),
            vec![
                replies::MODS_ENABLED.to_string(),
                replies::MODS_DISABLED.to_string(),
            ]
        );
        assert_eq!(transport.sent_to("b"), vec![replies::MODS_ENABLED.to_string()]);
    }
}
