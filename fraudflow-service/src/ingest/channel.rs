// Channel Source
// In-process message feed of JSON transaction events

use super::{coerce_all, RecordSource, SourceError};
use crate::schema::SchemaRegistry;
use crate::table::Table;

use tokio::sync::mpsc;

/// Producer side of a `ChannelSource`
pub type RecordSender = mpsc::UnboundedSender<serde_json::Value>;

/// Records pushed by producers over an unbounded tokio channel
///
/// Received records stay pending until acknowledged.
pub struct ChannelSource {
    receiver: mpsc::UnboundedReceiver<serde_json::Value>,
    pending: Vec<serde_json::Value>,
    received: u64,
}

impl ChannelSource {
    pub fn new() -> (RecordSender, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let source = Self {
            receiver,
            pending: Vec::new(),
            received: 0,
        };
        (sender, source)
    }

    /// Records received but not yet acknowledged
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn drain(&mut self) {
        while let Ok(record) = self.receiver.try_recv() {
            self.received += 1;
            self.pending.push(record);
        }
    }
}

impl RecordSource for ChannelSource {
    fn describe(&self) -> String {
        format!("channel ({} received)", self.received)
    }

    fn fetch(&mut self, schema: &SchemaRegistry) -> Result<Table, SourceError> {
        self.drain();
        let base = self.received - self.pending.len() as u64;
        coerce_all(
            schema,
            self.pending
                .iter()
                .enumerate()
                .map(|(i, record)| (format!("message {}", base + i as u64 + 1), record)),
        )
    }

    fn acknowledge(&mut self) {
        tracing::debug!(records = self.pending.len(), "acknowledged channel records");
        self.pending.clear();
    }
}
