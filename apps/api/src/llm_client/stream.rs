//! Server-sent-event decoding for streamed chat completions.
//!
//! Each event line looks like `data: {"choices":[{"delta":{"content":"..."}}]}`
//! and the stream ends with `data: [DONE]`. Network chunks do not respect line
//! boundaries, so bytes are buffered until a full line is available. A last
//! line without a trailing newline is decoded when the body ends.

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use super::{LlmError, TokenStream};

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

/// Incremental line decoder. Holds partial lines between chunks.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    /// Feeds one network chunk and returns the content fragments it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, LlmError> {
        self.buffer.extend_from_slice(chunk);
        let mut fragments = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if self.done {
                continue;
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(fragment) = self.decode_line(line.trim_end_matches(&['\r', '\n'][..]))? {
                fragments.push(fragment);
            }
        }

        Ok(fragments)
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Decodes whatever is left in the buffer once the body has ended.
    pub fn finish(&mut self) -> Result<Option<String>, LlmError> {
        if self.done || self.buffer.is_empty() {
            return Ok(None);
        }
        let rest = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&rest).into_owned();
        self.decode_line(line.trim_end_matches('\r'))
    }

    fn decode_line(&mut self, line: &str) -> Result<Option<String>, LlmError> {
        // Blank lines separate events; ':' lines are comments / keep-alives.
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(None);
        };
        let data = data.trim_start();

        if data == DONE_SENTINEL {
            self.done = true;
            return Ok(None);
        }

        let chunk: StreamChunk = serde_json::from_str(data)?;
        Ok(chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content))
    }
}

/// Turns a raw byte stream into a stream of content fragments.
/// Ends at `[DONE]` or, failing that, when the body ends and the buffer is flushed.
pub fn decode_event_stream<S, E>(bytes: S) -> TokenStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Send + 'static,
    LlmError: From<E>,
{
    let state = (bytes.boxed(), SseDecoder::default(), false);

    stream::unfold(state, |(mut bytes, mut decoder, finished)| async move {
        if finished {
            return None;
        }
        match bytes.next().await {
            Some(chunk) => {
                let fragment = chunk
                    .map_err(LlmError::from)
                    .and_then(|chunk| decoder.push(&chunk))
                    .map(|fragments| fragments.concat());
                let finished = decoder.is_done();
                Some((fragment, (bytes, decoder, finished)))
            }
            None => match decoder.finish() {
                Ok(None) => None,
                tail => Some((tail.map(Option::unwrap_or_default), (bytes, decoder, true))),
            },
        }
    })
    .boxed()
}
