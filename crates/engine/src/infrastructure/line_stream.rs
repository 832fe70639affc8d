//! Incremental line decoding for streaming provider bodies.
//!
//! OpenAI and Gemini stream SSE (`data: {...}` lines), Ollama streams NDJSON.
//! Both are line oriented, so every adapter turns its response body into
//! text fragments through [`text_stream`] with its own line decoder.

use std::collections::VecDeque;
use std::fmt::Display;

use futures_util::{Stream, StreamExt};
use roundtable_domain::Backend;

use crate::infrastructure::ports::{ProviderError, TextStream};

/// What one decoded line contributes to the fragment stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    Text(String),
    /// Keep-alives, metadata, empty deltas
    Skip,
    /// Provider signalled end of stream
    End,
}

/// Splits a byte stream into complete lines.
///
/// Bytes are buffered until a newline arrives, so multi-byte UTF-8 sequences
/// split across network chunks are decoded intact.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(decode_line(&raw));
        }
        lines
    }

    /// Whatever is left after the body ended without a trailing newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        let line = decode_line(&raw);
        (!line.is_empty()).then_some(line)
    }
}

fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(['\n', '\r'])
        .to_string()
}

/// Payload of an SSE `data:` line. Comments, `event:`/`id:` fields and blank
/// separators yield `None`.
pub fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

/// Map a non-2xx provider response to [`ProviderError::Status`] with the
/// raw body text.
pub async fn ensure_success(
    backend: Backend,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::transport(backend, e))?;
    Err(ProviderError::Status {
        backend,
        status: status.as_u16(),
        body,
    })
}

struct DecodeState<S, F> {
    body: std::pin::Pin<Box<S>>,
    decode: F,
    lines: LineBuffer,
    ready: VecDeque<String>,
    body_done: bool,
    finished: bool,
    yielded: bool,
}

/// Turn a streaming HTTP body into a fragment stream.
///
/// Fragments are yielded as soon as their line is complete. A body that ends
/// without producing any text yields [`ProviderError::EmptyBody`]; decoder
/// and transport errors are yielded once and end the stream.
pub fn text_stream<S, B, E, F>(backend: Backend, body: S, decode: F) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]>,
    E: Display,
    F: FnMut(&str) -> Result<LineEvent, ProviderError> + Send + 'static,
{
    let state = DecodeState {
        body: Box::pin(body),
        decode,
        lines: LineBuffer::default(),
        ready: VecDeque::new(),
        body_done: false,
        finished: false,
        yielded: false,
    };

    futures_util::stream::unfold(state, move |mut st| async move {
        loop {
            if st.finished {
                return None;
            }

            if let Some(line) = st.ready.pop_front() {
                if line.trim().is_empty() {
                    continue;
                }
                match (st.decode)(&line) {
                    Ok(LineEvent::Text(text)) if !text.is_empty() => {
                        st.yielded = true;
                        return Some((Ok(text), st));
                    }
                    Ok(LineEvent::Text(_)) | Ok(LineEvent::Skip) => continue,
                    Ok(LineEvent::End) => return end_of_stream(backend, st),
                    Err(e) => {
                        st.finished = true;
                        return Some((Err(e), st));
                    }
                }
            }

            if st.body_done {
                return end_of_stream(backend, st);
            }

            match st.body.next().await {
                Some(Ok(chunk)) => {
                    let lines = st.lines.push(chunk.as_ref());
                    st.ready.extend(lines);
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(ProviderError::transport(backend, e)), st));
                }
                None => {
                    st.body_done = true;
                    if let Some(rest) = st.lines.finish() {
                        st.ready.push_back(rest);
                    }
                }
            }
        }
    })
    .boxed()
}

fn end_of_stream<S, F>(
    backend: Backend,
    mut st: DecodeState<S, F>,
) -> Option<(Result<String, ProviderError>, DecodeState<S, F>)> {
    st.finished = true;
    if st.yielded {
        None
    } else {
        Some((Err(ProviderError::EmptyBody { backend }), st))
    }
}
