//! Incremental decoder for chat-completion server-sent events.

use serde_json::Value;

const DATA_PREFIX: &str = "data:";
const DONE_MARKER: &str = "[DONE]";

/// Turns a byte stream of `data: {...}` lines into content deltas.
///
/// Bytes may arrive split anywhere, including inside a UTF-8 sequence; only
/// complete lines are decoded. Lines that are not `data:` lines, or whose
/// payload is not JSON, are skipped. Decoding stops at `data: [DONE]`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    /// Create a decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the terminating `[DONE]` event was seen
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Feed bytes and collect the content deltas of every completed line
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        if self.done {
            return Vec::new();
        }
        self.pending.extend_from_slice(bytes);
        let mut chunks = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(chunk) = self.decode_line(&String::from_utf8_lossy(&line)) {
                chunks.push(chunk);
            }
            if self.done {
                self.pending.clear();
                break;
            }
        }
        chunks
    }

    /// Decode whatever is left once the stream closes without a final newline
    pub fn finish(&mut self) -> Vec<String> {
        if self.done || self.pending.is_empty() {
            return Vec::new();
        }
        let line = String::from_utf8_lossy(&std::mem::take(&mut self.pending)).into_owned();
        self.decode_line(&line).into_iter().collect()
    }

    fn decode_line(&mut self, line: &str) -> Option<String> {
        let payload = line.trim().strip_prefix(DATA_PREFIX)?.trim();
        if payload.is_empty() {
            return None;
        }
        if payload == DONE_MARKER {
            self.done = true;
            return None;
        }
        let event: Value = serde_json::from_str(payload).ok()?;
        event
            .pointer("/choices/0/delta/content")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"index": 0, "delta": {"content": content}}]})
        )
    }

    #[test]
    fn test_collects_deltas_until_done() {
        let mut decoder = SseDecoder::new();
        let stream = format!("{}{}data: [DONE]\n\n{}", event("{\"id\""), event(": 1}"), event("late"));
        let chunks = decoder.feed(stream.as_bytes());
        assert_eq!(chunks, vec!["{\"id\"", ": 1}"]);
        assert!(decoder.is_done());
        assert!(decoder.feed(event("more").as_bytes()).is_empty());
    }

    #[test]
    fn test_skips_noise() {
        let mut decoder = SseDecoder::new();
        let stream = concat!(
            ": keep-alive\n",
            "data:\n",
            "data: not json\n",
            "event: ping\n",
            "data: {\"choices\": [{\"delta\": {\"role\": \"assistant\"}}]}\n",
            "data: {\"choices\": []}\n",
        );
        assert!(decoder.feed(stream.as_bytes()).is_empty());
        assert!(!decoder.is_done());
    }

    #[test]
    fn test_split_across_feeds_including_utf8() {
        let mut decoder = SseDecoder::new();
        let bytes = event("登录").into_bytes();
        // Split inside the first multi-byte character
        let cut = bytes.iter().position(|b| *b >= 0x80).unwrap_or(0) + 1;
        assert!(decoder.feed(&bytes[..cut]).is_empty());
        assert_eq!(decoder.feed(&bytes[cut..]), vec!["登录"]);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        let line = event("tail");
        assert!(decoder.feed(line.trim_end().as_bytes()).is_empty());
        assert_eq!(decoder.finish(), vec!["tail"]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_crlf_lines() {
        let mut decoder = SseDecoder::new();
        let stream = event("a").replace('\n', "\r\n");
        assert_eq!(decoder.feed(stream.as_bytes()), vec!["a"]);
    }
}
