//! Field extraction for human-readable capture lines.
//!
//! There is no grammar for this text, only line shapes. IP traffic looks like
//!
//! ```text
//! 10:42:01.123456 IP 192.168.1.10.51514 > 93.184.216.34.https: Flags [S], seq 1, length 0
//! ```
//!
//! while ARP and STP frames use commas:
//!
//! ```text
//! 10:42:01.200000 ARP, Request who-has 192.168.1.1 tell 192.168.1.10, length 28
//! ```
//!
//! Split patterns are tried in order and the first hit wins. Anything else on
//! the line (protocol tag, dotted quads, length hint) is best effort and left
//! empty when it cannot be found.

use regex::Regex;

use crate::config::ExtractionSettings;
use crate::error::Result;
use crate::models::domain::{LineShape, PacketRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineMatch {
    Matched(PacketRecord),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipReason {
    Blank,
    /// Indented payload dump belonging to the previous packet.
    Continuation,
    /// No split pattern matched (headers, truncated lines, garbage).
    NoMatch,
}

struct SplitPattern {
    name: &'static str,
    shape: LineShape,
    regex: Regex,
}

/// Groups every split pattern must expose: 1 timestamp, 2 source,
/// 3 destination, 4 info (may be absent).
pub struct FieldExtractor {
    patterns: Vec<SplitPattern>,
    address_regex: Regex,
    length_regex: Regex,
    family_markers: Vec<String>,
}

impl FieldExtractor {
    pub fn new(settings: &ExtractionSettings) -> Result<Self> {
        let patterns = vec![
            SplitPattern {
                name: "ip",
                shape: LineShape::Ip,
                regex: Regex::new(
                    r"^(\d{2}:\d{2}:\d{2}\.\d{6})\s+(?:[A-Z][A-Z0-9]*\s+)?(\S.*?)\s+>\s+(.+?):(?:\s+(.*))?$",
                )?,
            },
            SplitPattern {
                name: "comma",
                shape: LineShape::Comma,
                // source tokens carry no `(`, so `-v` IP header lines fall through
                regex: Regex::new(
                    r"^(\d{2}:\d{2}:\d{2}\.\d{6})\s+([^\s,(]+(?:\s+[^\s,(]+)*),\s+(.+?)[,:](?:\s+(.*))?$",
                )?,
            },
        ];

        Ok(Self {
            patterns,
            address_regex: Regex::new(r"\b(\d{1,3}(?:\.\d{1,3}){3})(?:\.[0-9A-Za-z_-]+)?")?,
            length_regex: Regex::new(r"\blength (\d+)")?,
            family_markers: settings.family_markers.clone(),
        })
    }

    pub fn extract(&self, raw: &str) -> LineMatch {
        if raw.starts_with(|c: char| c.is_whitespace()) {
            return if raw.trim().is_empty() {
                LineMatch::Skipped(SkipReason::Blank)
            } else {
                LineMatch::Skipped(SkipReason::Continuation)
            };
        }
        let line = raw.trim_end();
        if line.is_empty() {
            return LineMatch::Skipped(SkipReason::Blank);
        }

        let Some((pattern, caps)) = self
            .patterns
            .iter()
            .find_map(|p| p.regex.captures(line).map(|caps| (p, caps)))
        else {
            return LineMatch::Skipped(SkipReason::NoMatch);
        };

        let group = |i: usize| caps.get(i).map(|m| m.as_str().trim()).unwrap_or_default();
        let (timestamp, source, destination) = (group(1), group(2), group(3));
        if source.is_empty() || destination.is_empty() {
            return LineMatch::Skipped(SkipReason::NoMatch);
        }
        let info = group(4);

        let mut addrs = self
            .address_regex
            .captures_iter(line)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()));
        let src_addr = addrs.next();
        let dst_addr = addrs.next();

        let length = self
            .length_regex
            .captures(info)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok());

        tracing::trace!(pattern = pattern.name, "matched capture line");

        LineMatch::Matched(PacketRecord {
            timestamp: timestamp.to_string(),
            source: source.to_string(),
            destination: destination.to_string(),
            protocol: self.protocol_tag(line),
            info: info.to_string(),
            src_addr,
            dst_addr,
            length,
            shape: pattern.shape,
        })
    }

    /// Only lines naming a known family get a tag. With a `>` the tag is the
    /// last dot segment of whatever precedes the next `:`, otherwise it is
    /// the token after the timestamp.
    fn protocol_tag(&self, line: &str) -> Option<String> {
        if !self.family_markers.iter().any(|m| line.contains(m.as_str())) {
            return None;
        }

        let tag = match line.split_once('>') {
            Some((_, after)) => after
                .split(':')
                .next()
                .unwrap_or_default()
                .trim()
                .rsplit('.')
                .next()
                .unwrap_or_default(),
            None => line
                .split_whitespace()
                .nth(1)
                .unwrap_or_default()
                .trim_end_matches(','),
        };

        (!tag.is_empty()).then(|| tag.to_string())
    }
}
