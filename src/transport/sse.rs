//! Server-sent-event decoding for streamed provider responses.

use crate::error::RapidaError;
use crate::interceptor::ChunkStream;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use std::fmt::Display;

/// Data of the event OpenAI-style streams end with.
const DONE: &str = "[DONE]";

/// Decode an SSE byte stream into JSON chunks as bytes arrive.
///
/// Blank events and the `[DONE]` terminator are skipped. A framing or JSON
/// error is yielded once and ends the sequence.
pub fn decode_events<S, B, E>(bytes: S) -> ChunkStream<RapidaError>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let mut events = Box::pin(bytes.eventsource());
    Box::pin(async_stream::stream! {
        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    yield Err(RapidaError::TransportError(format!("SSE stream error: {e}")));
                    return;
                }
            };

            let data = event.data.trim();
            if data.is_empty() || data == DONE {
                continue;
            }
            match serde_json::from_str(data) {
                Ok(chunk) => yield Ok(chunk),
                Err(e) => {
                    tracing::debug!(
                        target: "rapida::transport",
                        event = %event.event,
                        "undecodable SSE payload"
                    );
                    yield Err(RapidaError::from(e));
                    return;
                }
            }
        }
    })
}
