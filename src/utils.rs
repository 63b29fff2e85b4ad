use std::io::BufRead;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ImportError, ImportResult};

/// Replace every tab with a single space.
pub fn normalize(line: &str) -> String {
    line.replace('\t', " ")
}

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
}

/// Split a line on runs of whitespace after trimming. A blank line yields no tokens.
pub fn split(line: &str) -> impl Iterator<Item = &str> + '_ {
    whitespace()
        .split(line.trim())
        .filter(|token| !token.is_empty())
}

/////////////////////////////////////////////////////////////////////////////////////////////////

/// What a hierarchy line segment is about. Checked in declaration order; a segment gets exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Root,
    Joint,
    EndSite,
    Close,
    Channels,
    Offset,
    Motion,
    Other,
}

impl LineKind {
    /// Classify an already normalized line.
    pub fn classify(line: &str) -> LineKind {
        let trimmed = line.trim_start();
        if trimmed.starts_with("ROOT") {
            LineKind::Root
        } else if line.contains("JOINT") {
            LineKind::Joint
        } else if line.contains("End Site") {
            LineKind::EndSite
        } else if line.contains('}') {
            LineKind::Close
        } else if line.contains("CHANNELS") {
            LineKind::Channels
        } else if line.contains("OFFSET") {
            LineKind::Offset
        } else if line.contains("MOTION") {
            LineKind::Motion
        } else {
            LineKind::Other
        }
    }
}

/////////////////////////////////////////////////////////////////////////////////////////////////

/// A normalized source line with its 1-based line number.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub number: usize,
    pub text: String,
}

impl Line {
    pub fn tokens(&self) -> impl Iterator<Item = &str> + '_ {
        split(&self.text)
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Cut the line at every `{` and `}`, keeping each brace as a segment of its own.
    /// Segments come in source order, share the line number, and blank ones are dropped.
    pub fn segments(&self) -> Vec<Line> {
        let mut segments = Vec::new();
        let mut push = |text: &str| {
            if !text.trim().is_empty() {
                segments.push(Line {
                    number: self.number,
                    text: text.to_string(),
                });
            }
        };
        let mut rest = self.text.as_str();
        while let Some(at) = rest.find(|c: char| c == '{' || c == '}') {
            push(&rest[..at]);
            push(&rest[at..at + 1]);
            rest = &rest[at + 1..];
        }
        push(rest);
        segments
    }
}

/// Reads numbered, tab-normalized lines from any buffered source, one at a time.
pub struct LineReader<R> {
    reader: R,
    number: usize,
    buffer: String,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R) -> Self {
        LineReader {
            reader,
            number: 0,
            buffer: String::new(),
        }
    }

    /// Number of the last line handed out.
    pub fn line_number(&self) -> usize {
        self.number
    }

    pub fn next_line(&mut self) -> ImportResult<Option<Line>> {
        self.buffer.clear();
        if self.reader.read_line(&mut self.buffer)? == 0 {
            return Ok(None);
        }
        self.number += 1;
        let text = self.buffer.trim_end_matches(&['\n', '\r'][..]);
        Ok(Some(Line {
            number: self.number,
            text: normalize(text),
        }))
    }

    /// Consume blank lines and check that the first real one is the `HIERARCHY` header.
    pub fn expect_header(&mut self) -> ImportResult<()> {
        while let Some(line) = self.next_line()? {
            if line.is_blank() {
                continue;
            }
            let text = line.text.trim_start().trim_start_matches('\u{feff}');
            if text.starts_with("HIERARCHY") {
                return Ok(());
            }
            return Err(ImportError::format(
                line.number,
                format!("expected HIERARCHY header, found '{}'", line.text.trim()),
            ));
        }
        Err(ImportError::format(
            self.number,
            "empty file, expected HIERARCHY header",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_collapses_whitespace_runs() {
        let tokens: Vec<&str> = split("  CHANNELS 3\t Xposition   Yposition Zposition  ").collect();
        assert_eq!(
            tokens,
            vec!["CHANNELS", "3", "Xposition", "Yposition", "Zposition"]
        );
        assert_eq!(split("   ").count(), 0);
    }

    #[test]
    fn normalize_replaces_tabs() {
        assert_eq!(normalize("\tJOINT\tSpine"), " JOINT Spine");
    }

    #[test]
    fn classify_follows_priority() {
        assert_eq!(LineKind::classify("ROOT Hips"), LineKind::Root);
        assert_eq!(LineKind::classify("  JOINT LeftUpLeg"), LineKind::Joint);
        assert_eq!(LineKind::classify("End Site"), LineKind::EndSite);
        assert_eq!(LineKind::classify("  }"), LineKind::Close);
        assert_eq!(LineKind::classify("CHANNELS 1 Xrotation"), LineKind::Channels);
        assert_eq!(LineKind::classify("OFFSET 0 1 2"), LineKind::Offset);
        assert_eq!(LineKind::classify("MOTION"), LineKind::Motion);
        assert_eq!(LineKind::classify("{"), LineKind::Other);
        // a joint declared with its brace on the same line is still a joint
        assert_eq!(LineKind::classify("JOINT Neck }"), LineKind::Joint);
    }

    #[test]
    fn segments_split_at_braces() {
        let line = Line {
            number: 7,
            text: normalize("\tEnd Site { OFFSET 0 2 0 }"),
        };
        let texts: Vec<String> = line
            .segments()
            .into_iter()
            .map(|segment| segment.text.trim().to_string())
            .collect();
        assert_eq!(texts, vec!["End Site", "{", "OFFSET 0 2 0", "}"]);
        assert!(line.segments().iter().all(|segment| segment.number == 7));

        let line = Line {
            number: 1,
            text: "}}".to_string(),
        };
        assert_eq!(line.segments().len(), 2);
        assert!(Line { number: 1, text: "   ".to_string() }.segments().is_empty());
    }

    #[test]
    fn reader_numbers_and_normalizes_lines() {
        let mut reader = LineReader::new("HIERARCHY\r\n\tROOT Hips\n".as_bytes());
        reader.expect_header().unwrap();
        let line = reader.next_line().unwrap().unwrap();
        assert_eq!(line.number, 2);
        assert_eq!(line.text, " ROOT Hips");
        assert!(reader.next_line().unwrap().is_none());
    }

    #[test]
    fn header_check_skips_blank_lines() {
        let mut reader = LineReader::new("\n  \nHIERARCHY\n".as_bytes());
        assert!(reader.expect_header().is_ok());

        let mut reader = LineReader::new("ROOT Hips\n".as_bytes());
        let err = reader.expect_header().unwrap_err();
        assert!(matches!(err, ImportError::Format { line: 1, .. }));
    }
}
