use super::{EventStream, TransportError};
use futures::{future, stream, Stream, StreamExt, TryStreamExt};

/// Incremental `text/event-stream` decoder.
///
/// Only `data` fields are kept. `event`, `id`, `retry` and comment lines are skipped.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
    /// Last chunk ended on `\r`, a following `\n` belongs to the same line break.
    pending_cr: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns the data of every frame it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut frames = Vec::new();

        for &byte in chunk {
            if self.pending_cr {
                self.pending_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }

            match byte {
                b'\r' => {
                    self.pending_cr = true;
                    self.end_line(&mut frames);
                }
                b'\n' => self.end_line(&mut frames),
                _ => self.buffer.push(byte),
            }
        }

        frames
    }

    fn end_line(&mut self, frames: &mut Vec<String>) {
        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();

        if line.is_empty() {
            if !self.data.is_empty() {
                frames.push(self.data.join("\n"));
                self.data.clear();
            }

            return;
        }

        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_str(), ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" | "id" | "retry" => {}
            other => tracing::trace!(field = %other, "Ignoring unknown SSE field"),
        }
    }
}

/// Turns a stream of body chunks into a stream of frame payloads.
pub fn decode<S, B, E>(chunks: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + 'static,
    E: Into<TransportError> + 'static,
{
    chunks
        .scan(SseDecoder::new(), |decoder, chunk| {
            let frames: Result<Vec<String>, TransportError> = chunk
                .map(|bytes| decoder.feed(bytes.as_ref()))
                .map_err(Into::into);

            future::ready(Some(frames))
        })
        .map_ok(|frames| stream::iter(frames.into_iter().map(Ok)))
        .try_flatten()
        .boxed()
}
