use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tracing::{info, warn};

use flowpay_events::{EventBus, EventEnvelope, Subscription, Topical};

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Generic notification consumer loop.
///
/// - Subscribes to an event bus
/// - Applies a handler to each message (must tolerate redelivery)
/// - Supports graceful shutdown
/// - Optional topic filtering when several producers share one bus
#[derive(Debug)]
pub struct NotificationWorker;

impl NotificationWorker {
    /// Spawn a worker thread that processes messages from the bus
    /// subscription. The subscription is taken before this returns, so
    /// nothing published afterwards is missed.
    ///
    /// - `topic`: when provided, messages for other topics are ignored
    pub fn spawn<M, B, H, E>(
        name: &'static str,
        bus: B,
        topic: Option<String>,
        mut handler: H,
    ) -> io::Result<WorkerHandle>
    where
        M: Topical + Send + 'static,
        B: EventBus<M> + Send + Sync + 'static,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub: Subscription<M> = bus.subscribe();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, sub, shutdown_rx, topic, &mut handler))?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop<M, H, E>(
    name: &'static str,
    sub: Subscription<M>,
    shutdown_rx: mpsc::Receiver<()>,
    topic: Option<String>,
    handler: &mut H,
) where
    M: Topical,
    H: FnMut(M) -> Result<(), E>,
    E: core::fmt::Debug,
{
    let tick = Duration::from_millis(250);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(msg) => {
                if let Some(t) = topic.as_deref() {
                    if msg.topic() != t {
                        continue;
                    }
                }

                if let Err(err) = handler(msg) {
                    warn!(worker = name, error = ?err, "notification handler failed");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Handler that records each commit notification in the service log.
pub fn log_commit(envelope: EventEnvelope<JsonValue>) -> Result<(), serde_json::Error> {
    let payload = serde_json::to_string(envelope.payload())?;
    info!(
        topic = %envelope.topic(),
        key = %envelope.key(),
        event_type = %envelope.event_type(),
        event_id = %envelope.event_id(),
        payload = %payload,
        "event received"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use chrono::Utc;
    use flowpay_events::InMemoryEventBus;
    use uuid::Uuid;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

    fn envelope(topic: &str, key: &str) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            topic,
            key,
            "ledger.transaction_committed",
            1,
            Utc::now(),
            serde_json::json!({ "key": key }),
        )
    }

    fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..100 {
            if done() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn handles_only_its_topic() {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let handle = NotificationWorker::spawn(
            "test-worker",
            Arc::clone(&bus),
            Some("payments".to_string()),
            move |env: EventEnvelope<JsonValue>| -> Result<(), ()> {
                sink.lock().unwrap().push(env.key().to_string());
                Ok(())
            },
        )
        .unwrap();

        bus.publish(envelope("audit", "skip-me")).unwrap();
        bus.publish(envelope("payments", "k-1")).unwrap();
        bus.publish(envelope("payments", "k-2")).unwrap();

        wait_until(|| seen.lock().unwrap().len() == 2);
        handle.shutdown();

        assert_eq!(*seen.lock().unwrap(), vec!["k-1".to_string(), "k-2".to_string()]);
    }

    #[test]
    fn handler_errors_do_not_stop_the_worker() {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let calls = Arc::new(Mutex::new(0usize));

        let counter = Arc::clone(&calls);
        let handle = NotificationWorker::spawn(
            "failing-worker",
            Arc::clone(&bus),
            None,
            move |_env: EventEnvelope<JsonValue>| -> Result<(), &'static str> {
                *counter.lock().unwrap() += 1;
                Err("consumer offline")
            },
        )
        .unwrap();

        bus.publish(envelope("payments", "a")).unwrap();
        bus.publish(envelope("payments", "b")).unwrap();

        wait_until(|| *calls.lock().unwrap() == 2);
        handle.shutdown();

        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[test]
    fn log_commit_accepts_any_payload() {
        assert!(log_commit(envelope("payments", "k")).is_ok());
    }
}
