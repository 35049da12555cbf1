use crate::EventEnvelope;

/// Messages that are routed by topic.
///
/// Workers use this to ignore traffic for topics they don't own when several
/// producers share one bus.
pub trait Topical {
    fn topic(&self) -> &str;
}

impl<E> Topical for EventEnvelope<E> {
    fn topic(&self) -> &str {
        EventEnvelope::topic(self)
    }
}
