use crate::models::stream::{ DecoderEvent, StreamPayload };
use futures::{ stream, Stream, StreamExt };
use log::debug;
use std::collections::VecDeque;
use std::fmt::Display;

const DATA_PREFIX: &str = "data: ";
const CHUNK_TYPE: &str = "chunk";

/// Extracts the `content` of a `chunk` line. Blank, malformed and
/// non-chunk lines yield `None`.
pub fn parse_line(line: &str) -> Option<String> {
    let target = line.trim();
    if target.is_empty() {
        return None;
    }
    let target = target.strip_prefix(DATA_PREFIX).unwrap_or(target);

    match serde_json::from_str::<StreamPayload>(target) {
        Ok(payload) if payload.kind == CHUNK_TYPE => payload.content.filter(|c| !c.is_empty()),
        Ok(payload) => {
            debug!("Ignoring stream payload of type '{}'", payload.kind);
            None
        }
        Err(e) => {
            debug!("Discarding unparseable stream line ({}): {}", e, target);
            None
        }
    }
}

/// Incremental decoder for the newline-delimited chat stream.
///
/// Bytes are fed as they arrive; only complete lines are parsed, the
/// trailing partial line is carried into the next `feed`. Multi-byte
/// characters split across reads are held back until complete.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    pending_bytes: Vec<u8>,
    leftover: String,
    accumulated: String,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cumulative text decoded so far.
    pub fn text(&self) -> &str {
        &self.accumulated
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Vec<DecoderEvent> {
        let text = self.decode_utf8(bytes);
        self.leftover.push_str(&text);

        let mut events = Vec::new();
        while let Some(pos) = self.leftover.find('\n') {
            let line: String = self.leftover.drain(..=pos).collect();
            if let Some(event) = self.accept_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes whatever is left once the source is exhausted and emits `End`.
    pub fn finish(&mut self) -> Vec<DecoderEvent> {
        let mut events = Vec::new();
        if !self.pending_bytes.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending_bytes).into_owned();
            self.pending_bytes.clear();
            self.leftover.push_str(&tail);
        }
        let line = std::mem::take(&mut self.leftover);
        if let Some(event) = self.accept_line(&line) {
            events.push(event);
        }
        events.push(DecoderEvent::End);
        events
    }

    fn accept_line(&mut self, line: &str) -> Option<DecoderEvent> {
        let content = parse_line(line)?;
        self.accumulated.push_str(&content);
        Some(DecoderEvent::Chunk(self.accumulated.clone()))
    }

    fn decode_utf8(&mut self, bytes: &[u8]) -> String {
        self.pending_bytes.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending_bytes) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending_bytes.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending_bytes[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending_bytes.drain(..valid + len);
                        }
                        None => {
                            // incomplete sequence at the end, wait for more bytes
                            self.pending_bytes.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }
}

/// Turns a byte-chunk source into decoder events. Ends with exactly one
/// `End` or `Error`. Dropping the returned stream stops reading the source.
pub fn decode_stream<S, B, E>(source: S) -> impl Stream<Item = DecoderEvent>
    where S: Stream<Item = Result<B, E>> + Unpin, B: AsRef<[u8]>, E: Display
{
    let init = (source, ChunkDecoder::new(), VecDeque::new(), false);
    stream::unfold(init, |(mut source, mut decoder, mut queue, mut finished)| async move {
        loop {
            if let Some(event) = queue.pop_front() {
                return Some((event, (source, decoder, queue, finished)));
            }
            if finished {
                return None;
            }
            match source.next().await {
                Some(Ok(buf)) => queue.extend(decoder.feed(buf.as_ref())),
                Some(Err(e)) => {
                    queue.push_back(DecoderEvent::Error(e.to_string()));
                    finished = true;
                }
                None => {
                    queue.extend(decoder.finish());
                    finished = true;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(content: &str) -> String {
        format!("data: {}\n", serde_json::json!({ "type": "chunk", "content": content }))
    }

    fn chunks(events: &[DecoderEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                DecoderEvent::Chunk(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn parse_line_accepts_prefixed_and_bare_payloads() {
        assert_eq!(parse_line(r#"data: {"type":"chunk","content":"Hi"}"#), Some("Hi".into()));
        assert_eq!(parse_line(r#"  {"type":"chunk","content":"Hi"}  "#), Some("Hi".into()));
        assert_eq!(parse_line("data: {\"type\":\"chunk\",\"content\":\"Hi\"}\r"), Some("Hi".into()));
    }

    #[test]
    fn parse_line_discards_everything_else() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line("event: message"), None);
        assert_eq!(parse_line("data: [DONE]"), None);
        assert_eq!(parse_line(r#"data: {"type":"chunk","con"#), None);
        assert_eq!(parse_line(r#"data: {"type":"chunk","content":""}"#), None);
        assert_eq!(parse_line(r#"data: {"type":"chunk"}"#), None);
        assert_eq!(parse_line(r#"data: {"type":"end","content":"bye"}"#), None);
    }

    #[test]
    fn split_mid_json_emits_single_chunk_after_second_read() {
        let mut decoder = ChunkDecoder::new();
        let first = decoder.feed(br#"data: {"type":"chunk","con"#);
        assert!(first.is_empty());

        let second = decoder.feed(b"tent\":\"Hi\"}\n");
        assert_eq!(second, vec![DecoderEvent::Chunk("Hi".into())]);

        assert_eq!(decoder.finish(), vec![DecoderEvent::End]);
    }

    #[test]
    fn chunk_payload_is_cumulative() {
        let mut decoder = ChunkDecoder::new();
        let body = format!("{}\n{}{}", line("Hel"), line("lo"), line(" world"));
        let events = decoder.feed(body.as_bytes());
        assert_eq!(chunks(&events), vec!["Hel", "Hello", "Hello world"]);
        assert_eq!(decoder.text(), "Hello world");
    }

    #[test]
    fn final_text_is_independent_of_read_boundaries() {
        let parts = ["The ", "quick ", "brown ", "fox ", "— jumps ", "über ", "the dog"];
        let body: String = parts.iter().map(|p| line(p)).collect::<Vec<_>>().join("\n");
        let bytes = body.as_bytes();
        let expected: String = parts.concat();

        for size in 1..=bytes.len() {
            let mut decoder = ChunkDecoder::new();
            let mut events = Vec::new();
            for piece in bytes.chunks(size) {
                events.extend(decoder.feed(piece));
            }
            events.extend(decoder.finish());

            let emitted = chunks(&events);
            assert_eq!(emitted.len(), parts.len(), "read size {}", size);
            assert_eq!(emitted.last().map(String::as_str), Some(expected.as_str()));
            assert_eq!(events.last(), Some(&DecoderEvent::End));
        }
    }

    #[test]
    fn malformed_lines_between_chunks_are_ignored() {
        let mut decoder = ChunkDecoder::new();
        let body = format!(": keep-alive\ngarbage{{\n{}data: nope\n{}", line("a"), line("b"));
        let events = decoder.feed(body.as_bytes());
        assert_eq!(chunks(&events), vec!["a", "ab"]);
    }

    #[test]
    fn multibyte_character_split_across_reads() {
        let body = line("héllo");
        let bytes = body.as_bytes();
        let split = body.find('é').unwrap() + 1;

        let mut decoder = ChunkDecoder::new();
        assert!(decoder.feed(&bytes[..split]).is_empty());
        let events = decoder.feed(&bytes[split..]);
        assert_eq!(chunks(&events), vec!["héllo"]);
    }

    #[test]
    fn unterminated_last_line_is_parsed_on_finish() {
        let mut decoder = ChunkDecoder::new();
        let body = line("tail");
        assert!(decoder.feed(body.trim_end().as_bytes()).is_empty());
        assert_eq!(decoder.finish(), vec![DecoderEvent::Chunk("tail".into()), DecoderEvent::End]);
    }

    #[tokio::test]
    async fn decode_stream_ends_with_end() {
        let reads: Vec<Result<Vec<u8>, String>> = vec![
            Ok(br#"data: {"type":"chunk","con"#.to_vec()),
            Ok(b"tent\":\"Hi\"}\n".to_vec()),
            Ok(line(" there").into_bytes())
        ];
        let events: Vec<DecoderEvent> = decode_stream(stream::iter(reads)).collect().await;
        assert_eq!(events, vec![
            DecoderEvent::Chunk("Hi".into()),
            DecoderEvent::Chunk("Hi there".into()),
            DecoderEvent::End
        ]);
    }

    #[tokio::test]
    async fn decode_stream_reports_transport_failure_without_retracting() {
        let reads: Vec<Result<Vec<u8>, String>> = vec![
            Ok(line("partial").into_bytes()),
            Err("connection reset".to_string()),
            Ok(line(" never").into_bytes())
        ];
        let events: Vec<DecoderEvent> = decode_stream(stream::iter(reads)).collect().await;
        assert_eq!(events, vec![
            DecoderEvent::Chunk("partial".into()),
            DecoderEvent::Error("connection reset".into())
        ]);
    }
}
