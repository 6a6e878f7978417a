//! JSON lines sink, used by `--oneshot`

use super::MetricSink;
use crate::error::DispatchError;
use crate::metrics::MetricFamily;
use std::io::Write;

/// Writes one JSON object per family per line
pub struct JsonSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> MetricSink for JsonSink<W> {
    fn dispatch(&mut self, family: &MetricFamily) -> Result<(), DispatchError> {
        let name = family.name();
        serde_json::to_writer(&mut self.writer, family)
            .map_err(|source| DispatchError::Encode { family: name, source })?;
        self.writer
            .write_all(b"\n")
            .map_err(|source| DispatchError::Write { family: name, source })
    }

    fn end_cycle(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::warn!(error = %e, "Failed to flush JSON sink");
        }
    }
}
