use crate::error::EventsError;
use crate::messages::{EventStream, TaggedEvent};
use async_trait::async_trait;
use std::io::Write;
use tokio::sync::mpsc;

/// The sink that delivers event batches to downstream consumers.
///
/// A batch is always handed over in one call so that a consumer never sees
/// half of the rows of a query.
#[async_trait]
pub trait EventRouter: Send + Sync {
    async fn emit_stream(&self, tag: &str, stream: EventStream) -> Result<(), EventsError>;
}

/// Writes every event as one JSON line on stdout.
#[derive(Debug, Default, Clone)]
pub struct StdoutRouter;

impl StdoutRouter {
    pub fn new() -> Self {
        Self
    }

    fn write_stream<W: Write>(
        out: &mut W,
        tag: &str,
        stream: &EventStream,
    ) -> Result<(), EventsError> {
        for event in stream {
            let line = TaggedEvent { tag, time: &event.time, record: &event.record };
            serde_json::to_writer(&mut *out, &line)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }
}

#[async_trait]
impl EventRouter for StdoutRouter {
    async fn emit_stream(&self, tag: &str, stream: EventStream) -> Result<(), EventsError> {
        // Holding the lock for the whole batch keeps its lines contiguous.
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        Self::write_stream(&mut out, tag, &stream)
    }
}

/// Forwards `(tag, batch)` pairs to an in-process consumer.
#[derive(Debug, Clone)]
pub struct ChannelRouter {
    tx: mpsc::Sender<(String, EventStream)>,
}

impl ChannelRouter {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<(String, EventStream)>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventRouter for ChannelRouter {
    async fn emit_stream(&self, tag: &str, stream: EventStream) -> Result<(), EventsError> {
        self.tx
            .send((tag.to_string(), stream))
            .await
            .map_err(|_| EventsError::Closed)
    }
}
