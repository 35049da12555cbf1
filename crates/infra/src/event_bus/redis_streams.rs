//! Redis Streams-backed notification sink.
//!
//! Each envelope is appended with `XADD` to a stream named after its topic
//! (`payments` by default). Fields:
//!
//! | field | value |
//! |-------|-------|
//! | `key` | partition key (the idempotency key for ledger events) |
//! | `event_id` | envelope id, for consumer-side dedup |
//! | `event_type` | e.g. `ledger.transaction_committed` |
//! | `payload` | the whole envelope as JSON |
//!
//! Publishing is fire-and-forget from the ledger's point of view: one attempt,
//! failures surface as `RedisStreamsError` and are logged by the caller.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use redis::Commands;
use redis::streams::{StreamReadOptions, StreamReadReply};
use serde_json::Value as JsonValue;
use tracing::{instrument, warn};

use flowpay_events::{EventBus, EventEnvelope, Subscription};

/// Cap on stream length (approximate trim on every `XADD`).
const DEFAULT_MAX_LEN: usize = 100_000;

/// Subscriber poll: block this long per `XREAD`.
const READ_BLOCK_MS: usize = 1_000;
const READ_BATCH: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum RedisStreamsError {
    #[error("Redis connection error: {0}")]
    Connection(String),

    #[error("Redis command error: {0}")]
    Command(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone)]
pub struct RedisStreamsEventBus {
    client: Arc<redis::Client>,
    /// Stream read by `subscribe()`.
    topic: String,
    max_len: usize,
}

impl RedisStreamsEventBus {
    /// `redis_url` e.g. "redis://localhost:6379"; `topic` is the stream that
    /// `subscribe()` follows.
    pub fn new(
        redis_url: impl AsRef<str>,
        topic: impl Into<String>,
    ) -> Result<Self, RedisStreamsError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            topic: topic.into(),
            max_len: DEFAULT_MAX_LEN,
        })
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len.max(1);
        self
    }

    /// Round-trip a `PING`; used at startup to fail fast on a bad URL.
    pub fn ping(&self) -> Result<(), RedisStreamsError> {
        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;
        redis::cmd("PING")
            .query::<String>(&mut conn)
            .map(|_| ())
            .map_err(|e| RedisStreamsError::Command(format!("PING failed: {e}")))
    }

    #[instrument(
        skip(self, message),
        fields(
            topic = %message.topic(),
            key = %message.key(),
            event_id = %message.event_id()
        ),
        err
    )]
    fn publish_sync(&self, message: EventEnvelope<JsonValue>) -> Result<(), RedisStreamsError> {
        let fields = stream_fields(&message)?;

        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;

        let _: String = redis::cmd("XADD")
            .arg(message.topic())
            .arg("MAXLEN")
            .arg("~")
            .arg(self.max_len)
            .arg("*")
            .arg(&fields[..])
            .query(&mut conn)
            .map_err(|e| RedisStreamsError::Command(format!("XADD failed: {e}")))?;

        Ok(())
    }

    /// Follow `topic` from now on (entries appended before the call are not
    /// replayed).
    pub fn subscribe_topic(&self, topic: &str) -> Subscription<EventEnvelope<JsonValue>> {
        let (tx, rx) = mpsc::channel();
        let client = Arc::clone(&self.client);
        let topic = topic.to_string();

        let spawned = thread::Builder::new()
            .name(format!("redis-xread-{topic}"))
            .spawn(move || follow_stream(&client, &topic, &tx));
        if let Err(e) = spawned {
            warn!(error = %e, "failed to spawn redis stream reader; subscription will stay empty");
        }

        Subscription::new(rx)
    }
}

impl EventBus<EventEnvelope<JsonValue>> for RedisStreamsEventBus {
    type Error = RedisStreamsError;

    fn publish(&self, message: EventEnvelope<JsonValue>) -> Result<(), Self::Error> {
        self.publish_sync(message)
    }

    fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
        self.subscribe_topic(&self.topic)
    }
}

fn stream_fields(
    message: &EventEnvelope<JsonValue>,
) -> Result<Vec<(&'static str, String)>, RedisStreamsError> {
    let payload = serde_json::to_string(message)
        .map_err(|e| RedisStreamsError::Serialization(e.to_string()))?;

    Ok(vec![
        ("key", message.key().to_string()),
        ("event_id", message.event_id().to_string()),
        ("event_type", message.event_type().to_string()),
        ("payload", payload),
    ])
}

/// Reader loop. Ends when the subscription is dropped (first failed send).
fn follow_stream(
    client: &redis::Client,
    topic: &str,
    tx: &mpsc::Sender<EventEnvelope<JsonValue>>,
) {
    let opts = StreamReadOptions::default()
        .block(READ_BLOCK_MS)
        .count(READ_BATCH);
    let mut last_id = "$".to_string();
    let mut conn: Option<redis::Connection> = None;

    loop {
        if conn.is_none() {
            match client.get_connection() {
                Ok(c) => conn = Some(c),
                Err(e) => {
                    warn!(topic, error = %e, "redis stream reader cannot connect; retrying");
                    thread::sleep(Duration::from_secs(1));
                    continue;
                }
            }
        }
        let Some(c) = conn.as_mut() else { continue };

        let reply: Option<StreamReadReply> = match c.xread_options(&[topic], &[&last_id], &opts) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(topic, error = %e, "XREAD failed; reconnecting");
                conn = None;
                thread::sleep(Duration::from_millis(200));
                continue;
            }
        };

        let Some(reply) = reply else { continue };
        for stream in reply.keys {
            for entry in stream.ids {
                last_id = entry.id.clone();

                let Some(payload) = entry.get::<String>("payload") else {
                    warn!(topic, entry_id = %entry.id, "stream entry without payload; skipped");
                    continue;
                };
                match serde_json::from_str::<EventEnvelope<JsonValue>>(&payload) {
                    Ok(envelope) => {
                        if tx.send(envelope).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(topic, entry_id = %entry.id, error = %e, "undecodable stream entry; skipped");
                    }
                }
            }
        }
    }
}
