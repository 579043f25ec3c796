// ABOUTME: Incremental parser for the container-creation SSE progress stream
// Robust to arbitrary chunk boundaries; malformed frames are skipped

use tracing::debug;

use crate::models::ProgressEvent;

const EVENT_DELIMITER: &str = "\n\n";
const DATA_PREFIX: &str = "data:";

/// Buffering parser for `data: <json>\n\n` framed progress events.
///
/// Bytes are fed as they arrive from the transport; only frames whose
/// delimiter has been seen are drained, so events are never produced from
/// a partially received payload.
#[derive(Debug, Default)]
pub struct ProgressStreamParser {
    buffer: String,
}

impl ProgressStreamParser {
    /// Feed arbitrary bytes and drain the complete events they finish.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ProgressEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut events = Vec::new();

        while let Some(split) = self.buffer.find(EVENT_DELIMITER) {
            let frame = self.buffer[..split].to_string();
            self.buffer.drain(0..split + EVENT_DELIMITER.len());

            if let Some(event) = parse_frame(&frame) {
                events.push(event);
            }
        }

        events
    }

    /// Final parse pass over whatever remains after end-of-stream.
    pub fn finish(&mut self) -> Vec<ProgressEvent> {
        let remainder = std::mem::take(&mut self.buffer);
        if remainder.trim().is_empty() {
            return Vec::new();
        }
        parse_frame(&remainder).into_iter().collect()
    }
}

/// Extract the `data: ` payload of one frame and parse it as a
/// [`ProgressEvent`]. Invalid JSON is logged and dropped; the stream
/// carries on with the next frame.
fn parse_frame(frame: &str) -> Option<ProgressEvent> {
    let payload: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix(DATA_PREFIX))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect();

    if payload.is_empty() {
        return None;
    }

    let payload = payload.join("\n");
    match serde_json::from_str::<ProgressEvent>(&payload) {
        Ok(event) => Some(event),
        Err(err) => {
            debug!("skipping malformed progress frame: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_complete_frames_in_order() {
        let mut parser = ProgressStreamParser::default();
        let events = parser.feed(
            b"data: {\"stage\":\"a\",\"message\":\"one\",\"progress\":10}\n\ndata: {\"stage\":\"b\",\"message\":\"two\",\"progress\":20}\n\n",
        );
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].stage, "a");
        assert_eq!(events[1].stage, "b");
    }

    #[test]
    fn holds_partial_frames_across_feeds() {
        let frame = "data: {\"stage\":\"a\",\"message\":\"one\",\"progress\":10}\n\n";
        // Split at every byte offset; the event must parse exactly once.
        for split in 0..frame.len() {
            let mut parser = ProgressStreamParser::default();
            let mut events = parser.feed(frame[..split].as_bytes());
            events.extend(parser.feed(frame[split..].as_bytes()));
            assert_eq!(events.len(), 1, "split at {split}");
            assert_eq!(events[0].progress, 10);
        }
    }

    #[test]
    fn skips_malformed_json_and_continues() {
        let mut parser = ProgressStreamParser::default();
        let events = parser.feed(
            b"data: {not json}\n\ndata: {\"stage\":\"b\",\"message\":\"ok\",\"progress\":50}\n\n",
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].stage, "b");
    }

    #[test]
    fn ignores_non_data_lines() {
        let mut parser = ProgressStreamParser::default();
        let events = parser
            .feed(b": keepalive\nretry: 500\ndata: {\"stage\":\"a\",\"message\":\"m\",\"progress\":5}\n\n");
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn finish_flushes_trailing_frame_without_delimiter() {
        let mut parser = ProgressStreamParser::default();
        assert!(parser
            .feed(b"data: {\"stage\":\"end\",\"message\":\"m\",\"progress\":100}")
            .is_empty());
        let events = parser.finish();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].stage, "end");
        assert!(parser.finish().is_empty());
    }
}
