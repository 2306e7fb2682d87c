//! Diagnostic-stream reader for the producer process.
//!
//! The producer multiplexes two kinds of lines on its diagnostic stream,
//! distinguished by terminator: `\n` ends a log line (buffered, surfaced
//! only on failure) and `\r` ends a progress update of the form
//! `Frame: <current>/<total>` with an optional `(<fps> fps)` suffix.

use std::io::{BufRead, BufReader, Read};

/// One parsed progress update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressLine {
    pub current: u32,
    pub total: u32,
    /// Rate reported by the producer itself, when present.
    pub fps: Option<f64>,
}

/// A tagged line from the diagnostic stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Log(String),
    Progress(ProgressLine),
}

/// Lazy reader over a diagnostic stream, yielding tagged events.
///
/// Reads are buffered; a line is complete at the first `\r` or `\n`. A
/// `\r`-terminated line that does not match the progress grammar is treated
/// as a log line rather than dropped.
pub struct DiagnosticReader<R: Read> {
    inner: BufReader<R>,
}

impl<R: Read> DiagnosticReader<R> {
    pub fn new(stream: R) -> Self {
        Self {
            inner: BufReader::new(stream),
        }
    }

    fn read_terminated_line(&mut self) -> std::io::Result<Option<(String, u8)>> {
        let mut line = Vec::new();
        loop {
            let buf = self.inner.fill_buf()?;
            if buf.is_empty() {
                if line.is_empty() {
                    return Ok(None);
                }
                return Ok(Some((String::from_utf8_lossy(&line).into_owned(), b'\n')));
            }

            match buf.iter().position(|b| *b == b'\r' || *b == b'\n') {
                Some(idx) => {
                    let terminator = buf[idx];
                    line.extend_from_slice(&buf[..idx]);
                    self.inner.consume(idx + 1);
                    return Ok(Some((
                        String::from_utf8_lossy(&line).into_owned(),
                        terminator,
                    )));
                }
                None => {
                    let len = buf.len();
                    line.extend_from_slice(buf);
                    self.inner.consume(len);
                }
            }
        }
    }
}

impl<R: Read> Iterator for DiagnosticReader<R> {
    type Item = std::io::Result<StreamEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.read_terminated_line() {
                Err(e) => return Some(Err(e)),
                Ok(None) => return None,
                Ok(Some((line, terminator))) => {
                    if line.is_empty() {
                        // Stray terminator, e.g. the \n of a \r\n pair.
                        continue;
                    }
                    if terminator == b'\r' {
                        if let Some(progress) = parse_progress_line(&line) {
                            return Some(Ok(StreamEvent::Progress(progress)));
                        }
                    }
                    return Some(Ok(StreamEvent::Log(line)));
                }
            }
        }
    }
}

/// Parse `Frame: <current>/<total>( (<fps> fps))?`.
pub fn parse_progress_line(line: &str) -> Option<ProgressLine> {
    let rest = line.trim().strip_prefix("Frame:")?.trim_start();

    let (counts, fps_part) = match rest.split_once(" (") {
        Some((counts, fps)) => (counts, Some(fps)),
        None => (rest, None),
    };

    let (current, total) = counts.split_once('/')?;
    let current = current.trim().parse().ok()?;
    let total = total.trim().parse().ok()?;

    let fps = match fps_part {
        Some(part) => {
            let value = part.strip_suffix("fps)")?.trim();
            Some(value.parse().ok()?)
        }
        None => None,
    };

    Some(ProgressLine {
        current,
        total,
        fps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn events(input: &str) -> Vec<StreamEvent> {
        DiagnosticReader::new(Cursor::new(input.as_bytes()))
            .map(|e| e.unwrap())
            .collect()
    }

    #[test]
    fn progress_with_fps_suffix() {
        let parsed = parse_progress_line("Frame: 12/240 (23.50 fps)").unwrap();
        assert_eq!(parsed.current, 12);
        assert_eq!(parsed.total, 240);
        assert!(parsed.fps.unwrap() > 0.0);
    }

    #[test]
    fn progress_without_fps_suffix() {
        let parsed = parse_progress_line("Frame: 240/240").unwrap();
        assert_eq!(parsed.current, 240);
        assert_eq!(parsed.total, 240);
        assert_eq!(parsed.fps, None);
    }

    #[test]
    fn non_matching_lines_are_not_progress() {
        assert_eq!(parse_progress_line("Frames: 1/2"), None);
        assert_eq!(parse_progress_line("Frame: x/2"), None);
        assert_eq!(parse_progress_line("Frame: 1of2"), None);
        assert_eq!(parse_progress_line("Frame: 1/2 (fast fps)"), None);
    }

    #[test]
    fn terminator_decides_the_variant() {
        let got = events("loading model\nFrame: 1/100\rFrame: 2/100 (9.81 fps)\rwarn: dropped frame\n");
        assert_eq!(
            got,
            vec![
                StreamEvent::Log("loading model".to_string()),
                StreamEvent::Progress(ProgressLine {
                    current: 1,
                    total: 100,
                    fps: None
                }),
                StreamEvent::Progress(ProgressLine {
                    current: 2,
                    total: 100,
                    fps: Some(9.81)
                }),
                StreamEvent::Log("warn: dropped frame".to_string()),
            ]
        );
    }

    #[test]
    fn cr_line_that_is_not_progress_becomes_a_log_line() {
        let got = events("spinner |\r");
        assert_eq!(got, vec![StreamEvent::Log("spinner |".to_string())]);
    }

    #[test]
    fn unterminated_tail_is_flushed_as_log() {
        let got = events("partial output");
        assert_eq!(got, vec![StreamEvent::Log("partial output".to_string())]);
    }

    #[test]
    fn crlf_pairs_do_not_emit_empty_lines() {
        let got = events("Frame: 5/10\r\nFrame: 6/10\r\n");
        assert_eq!(got.len(), 2);
        assert!(got.iter().all(|e| matches!(e, StreamEvent::Progress(_))));
    }

    proptest::proptest! {
        #[test]
        fn formatted_progress_always_parses(current in 0u32..1_000_000, total in 1u32..1_000_000, fps in 0.01f64..10_000.0) {
            let with_fps = format!("Frame: {current}/{total} ({fps:.2} fps)");
            let parsed = parse_progress_line(&with_fps).unwrap();
            proptest::prop_assert_eq!(parsed.current, current);
            proptest::prop_assert_eq!(parsed.total, total);
            proptest::prop_assert!(parsed.fps.unwrap() >= 0.0);

            let bare = format!("Frame: {current}/{total}");
            let parsed = parse_progress_line(&bare).unwrap();
            proptest::prop_assert_eq!(parsed.current, current);
            proptest::prop_assert_eq!(parsed.fps, None);
        }
    }
}
