use futures::stream::{ self, Stream, StreamExt };
use std::collections::VecDeque;

/// Splits an SSE byte stream into `data:` payloads. Lines may arrive split
/// across network chunks, so incomplete tails are carried over.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = parse_data_line(&String::from_utf8_lossy(&line)) {
                payloads.push(data);
            }
        }
        payloads
    }

    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        parse_data_line(&String::from_utf8_lossy(&rest))
    }
}

fn parse_data_line(line: &str) -> Option<String> {
    let line = line.trim_end_matches(['\r', '\n']);
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data.trim().is_empty() {
        return None;
    }
    Some(data.to_string())
}

struct DecodeState<S> {
    inner: S,
    decoder: SseLineDecoder,
    pending: VecDeque<String>,
    done: bool,
}

pub fn data_payloads<S, B, E>(bytes: S) -> impl Stream<Item = Result<String, E>> + Send
    where
        S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
        B: AsRef<[u8]> + Send,
        E: Send + 'static
{
    let state = DecodeState {
        inner: bytes,
        decoder: SseLineDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(payload) = st.pending.pop_front() {
                return Some((Ok(payload), st));
            }
            if st.done {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(chunk)) => {
                    let payloads = st.decoder.push(chunk.as_ref());
                    st.pending.extend(payloads);
                }
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.done = true;
                    if let Some(tail) = st.decoder.finish() {
                        st.pending.push_back(tail);
                    }
                }
            }
        }
    })
}
