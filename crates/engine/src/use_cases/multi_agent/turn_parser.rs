//! Incremental parser for the `{utterance, next_speaker}` turn directive.
//!
//! Providers stream the directive as raw JSON text split at arbitrary points.
//! The parser scans it one character at a time, tracking brace depth and
//! string/escape state, so it can:
//!
//! - forward the decoded `utterance` value as it arrives (each character once),
//! - ignore anything outside the top-level object (code fences, chatter),
//! - hand the complete object to `serde_json` and validate it once it closes.

use roundtable_domain::{SpeakerRoster, TurnDirective};

const UTTERANCE_KEY: &str = "utterance";

/// Detail reported when a stream ends without a closed object.
pub const INCOMPLETE_DIRECTIVE: &str = "provider stream ended before a complete turn directive";

/// Detail reported when the object repeats the `utterance` key.
pub const DUPLICATE_UTTERANCE: &str = "turn directive repeats the utterance key";

/// What the parser produced from the text seen so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserOutput {
    /// Newly decoded utterance text
    Delta(String),
    Completed(TurnDirective),
    /// The object closed but is not a valid directive
    Invalid(String),
}

/// Where a depth-1 token sits inside the top-level object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Key,
    Colon,
    Value,
    /// After a value: `,` or the closing brace
    Separator,
}

/// Kind of string currently being scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringKind {
    Key,
    Utterance,
    Other,
}

#[derive(Debug, Default)]
struct Unicode {
    value: u32,
    digits: u8,
}

pub struct TurnParser {
    roster: SpeakerRoster,
    depth: usize,
    /// Raw text of the object being scanned, braces included
    object: String,
    expect: Expect,
    string: Option<StringKind>,
    escape: bool,
    unicode: Option<Unicode>,
    high_surrogate: Option<u32>,
    key: String,
    last_key: String,
    utterance_streamed: bool,
    duplicate_utterance: bool,
    /// Decoded utterance text not yet handed out
    pending: String,
    resolved: bool,
}

impl TurnParser {
    pub fn new(roster: SpeakerRoster) -> Self {
        Self {
            roster,
            depth: 0,
            object: String::new(),
            expect: Expect::Key,
            string: None,
            escape: false,
            unicode: None,
            high_surrogate: None,
            key: String::new(),
            last_key: String::new(),
            utterance_streamed: false,
            duplicate_utterance: false,
            pending: String::new(),
            resolved: false,
        }
    }

    /// Feed the next raw fragment.
    pub fn push(&mut self, fragment: &str) -> Vec<ParserOutput> {
        let mut outputs = Vec::new();
        for c in fragment.chars() {
            if let Some(result) = self.scan(c) {
                self.flush(&mut outputs);
                outputs.push(result);
            }
        }
        self.flush(&mut outputs);
        outputs
    }

    /// Signal end of stream.
    pub fn finish(&mut self) -> Vec<ParserOutput> {
        let mut outputs = Vec::new();
        self.flush(&mut outputs);
        if self.depth > 0 || !self.resolved {
            self.reset_object();
            self.resolved = true;
            outputs.push(ParserOutput::Invalid(INCOMPLETE_DIRECTIVE.to_string()));
        }
        outputs
    }

    fn flush(&mut self, outputs: &mut Vec<ParserOutput>) {
        if !self.pending.is_empty() {
            outputs.push(ParserOutput::Delta(std::mem::take(&mut self.pending)));
        }
    }

    fn scan(&mut self, c: char) -> Option<ParserOutput> {
        if self.depth == 0 {
            if c == '{' {
                self.depth = 1;
                self.object.push(c);
            }
            return None;
        }

        self.object.push(c);

        if let Some(kind) = self.string {
            self.scan_string(kind, c);
            return None;
        }

        match c {
            '"' => {
                let kind = match (self.depth, self.expect) {
                    (1, Expect::Key) => {
                        self.key.clear();
                        StringKind::Key
                    }
                    (1, Expect::Value)
                        if self.last_key == UTTERANCE_KEY && !self.utterance_streamed =>
                    {
                        StringKind::Utterance
                    }
                    _ => StringKind::Other,
                };
                self.string = Some(kind);
            }
            '{' | '[' => {
                if self.depth == 1 {
                    self.expect = Expect::Separator;
                }
                self.depth += 1;
            }
            ']' => self.depth = self.depth.saturating_sub(1).max(1),
            '}' => {
                self.depth -= 1;
                if self.depth == 0 {
                    return Some(self.complete());
                }
            }
            ':' if self.depth == 1 => self.expect = Expect::Value,
            ',' if self.depth == 1 => self.expect = Expect::Key,
            c if self.depth == 1 && self.expect == Expect::Value && !c.is_whitespace() => {
                // Bare literal (number, bool, null)
                self.expect = Expect::Separator;
            }
            _ => {}
        }
        None
    }

    fn scan_string(&mut self, kind: StringKind, c: char) {
        if let Some(mut unicode) = self.unicode.take() {
            if let Some(digit) = c.to_digit(16) {
                unicode.value = unicode.value * 16 + digit;
                unicode.digits += 1;
                if unicode.digits < 4 {
                    self.unicode = Some(unicode);
                } else {
                    self.emit_code_unit(kind, unicode.value);
                }
                return;
            }
            // Malformed escape: serde_json will reject the object at close.
        }

        if self.escape {
            self.escape = false;
            let decoded = match c {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                'b' => '\u{8}',
                'f' => '\u{c}',
                'u' => {
                    self.unicode = Some(Unicode::default());
                    return;
                }
                other => other,
            };
            self.emit_char(kind, decoded);
            return;
        }

        match c {
            '\\' => self.escape = true,
            '"' => self.end_string(kind),
            c => self.emit_char(kind, c),
        }
    }

    fn end_string(&mut self, kind: StringKind) {
        self.string = None;
        self.drop_dangling_surrogate(kind);
        match kind {
            StringKind::Key => {
                self.last_key = std::mem::take(&mut self.key);
                if self.last_key == UTTERANCE_KEY && self.utterance_streamed {
                    self.duplicate_utterance = true;
                }
                self.expect = Expect::Colon;
            }
            StringKind::Utterance => {
                self.utterance_streamed = true;
                self.expect = Expect::Separator;
            }
            StringKind::Other if self.depth == 1 => self.expect = Expect::Separator,
            StringKind::Other => {}
        }
    }

    fn emit_code_unit(&mut self, kind: StringKind, unit: u32) {
        match unit {
            0xD800..=0xDBFF => {
                self.drop_dangling_surrogate(kind);
                self.high_surrogate = Some(unit);
            }
            0xDC00..=0xDFFF => match self.high_surrogate.take() {
                Some(high) => {
                    let code = 0x10000 + ((high - 0xD800) << 10) + (unit - 0xDC00);
                    self.emit_char(kind, char::from_u32(code).unwrap_or('\u{FFFD}'));
                }
                None => self.emit_char(kind, '\u{FFFD}'),
            },
            _ => self.emit_char(kind, char::from_u32(unit).unwrap_or('\u{FFFD}')),
        }
    }

    fn drop_dangling_surrogate(&mut self, kind: StringKind) {
        if self.high_surrogate.take().is_some() {
            self.push_decoded(kind, '\u{FFFD}');
        }
    }

    fn emit_char(&mut self, kind: StringKind, c: char) {
        self.drop_dangling_surrogate(kind);
        self.push_decoded(kind, c);
    }

    fn push_decoded(&mut self, kind: StringKind, c: char) {
        match kind {
            StringKind::Key => self.key.push(c),
            StringKind::Utterance => self.pending.push(c),
            StringKind::Other => {}
        }
    }

    fn complete(&mut self) -> ParserOutput {
        let text = std::mem::take(&mut self.object);
        let duplicate = self.duplicate_utterance;
        self.reset_object();
        self.resolved = true;

        // serde_json keeps the last value, which is not the one streamed.
        if duplicate {
            return ParserOutput::Invalid(DUPLICATE_UTTERANCE.to_string());
        }

        let value: serde_json::Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => return ParserOutput::Invalid(format!("malformed turn directive: {e}")),
        };
        match TurnDirective::from_value(&value, &self.roster) {
            Ok(directive) => ParserOutput::Completed(directive),
            Err(e) => ParserOutput::Invalid(e.to_string()),
        }
    }

    fn reset_object(&mut self) {
        self.depth = 0;
        self.object.clear();
        self.expect = Expect::Key;
        self.string = None;
        self.escape = false;
        self.unicode = None;
        self.high_surrogate = None;
        self.key.clear();
        self.last_key.clear();
        self.utterance_streamed = false;
        self.duplicate_utterance = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> TurnParser {
        TurnParser::new(SpeakerRoster::new(["a".to_string(), "b".to_string()]))
    }

    fn deltas(outputs: &[ParserOutput]) -> String {
        outputs
            .iter()
            .filter_map(|o| match o {
                ParserOutput::Delta(d) => Some(d.as_str()),
                _ => None,
            })
            .collect()
    }

    fn completed(outputs: &[ParserOutput]) -> Vec<&TurnDirective> {
        outputs
            .iter()
            .filter_map(|o| match o {
                ParserOutput::Completed(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    fn feed(parts: &[&str]) -> Vec<ParserOutput> {
        let mut parser = parser();
        let mut outputs: Vec<ParserOutput> = parts.iter().flat_map(|p| parser.push(p)).collect();
        if completed(&outputs).is_empty() {
            outputs.extend(parser.finish());
        }
        outputs
    }

    #[test]
    fn test_split_key_example() {
        let outputs = feed(&[r#"{"utter"#, r#"ance":"こんにちは","next_speaker":"a"}"#]);
        assert_eq!(
            outputs,
            vec![
                ParserOutput::Delta("こんにちは".to_string()),
                ParserOutput::Completed(TurnDirective {
                    utterance: "こんにちは".to_string(),
                    next_speaker: "a".to_string(),
                }),
            ]
        );
    }

    #[test]
    fn test_split_at_every_char_boundary() {
        let full = r#"{"utterance":"こんにちは","next_speaker":"a"}"#;
        for (split, _) in full.char_indices().skip(1) {
            let outputs = feed(&[&full[..split], &full[split..]]);
            assert_eq!(deltas(&outputs), "こんにちは", "split at byte {split}");
            let done = completed(&outputs);
            assert_eq!(done.len(), 1, "split at byte {split}");
            assert_eq!(done[0].next_speaker, "a");
        }
    }

    #[test]
    fn test_one_char_at_a_time_streams_early() {
        let mut parser = parser();
        assert!(parser.push(r#"{"utterance":"#).is_empty());
        assert_eq!(
            parser.push(r#""こん"#),
            vec![ParserOutput::Delta("こん".to_string())]
        );
        assert_eq!(
            parser.push("にちは"),
            vec![ParserOutput::Delta("にちは".to_string())]
        );
        let tail = parser.push(r#"", "next_speaker": "b"}"#);
        assert_eq!(completed(&tail).len(), 1);
        assert!(parser.finish().is_empty());
    }

    #[test]
    fn test_escapes_are_decoded() {
        let outputs = feed(&[
            r#"{"utterance":"He said \"go\"\nthen é",#,
            r#""next_speaker":"b"}"#,
        ]);
        assert_eq!(deltas(&outputs), "He said \"go\"\nthen é");
        assert_eq!(completed(&outputs)[0].utterance, "He said \"go\"\nthen é");
    }

    #[test]
    fn test_escape_split_across_fragments() {
        let outputs = feed(&[
            r#"{"utterance":"x\"#,
            r#""y\u00"#,
            r#"e9 \ud83d"#,
            r#"\ude00","next_speaker":"a"}"#,
        ]);
        assert_eq!(deltas(&outputs), "x\"yé 😀");
        assert_eq!(completed(&outputs)[0].utterance, "x\"yé 😀");
    }

    #[test]
    fn test_code_fences_and_chatter_are_ignored() {
        let outputs = feed(&[
            "Sure! ```json\n",
            r#"{"next_speaker":"a","utterance":"ok"}"#,
            "\n```",
        ]);
        assert_eq!(deltas(&outputs), "ok");
        assert_eq!(completed(&outputs).len(), 1);
    }

    #[test]
    fn test_other_string_values_are_not_streamed() {
        let outputs = feed(&[
            r#"{"mood":"utterance","next_speaker":"a","meta":{"utterance":"no"},"utterance":"yes"}"#,
        ]);
        assert_eq!(deltas(&outputs), "yes");
        assert_eq!(completed(&outputs)[0].utterance, "yes");
    }

    #[test]
    fn test_braces_inside_strings_do_not_close() {
        let outputs = feed(&[r#"{"utterance":"a } b { c","next_speaker":"b"}"#]);
        assert_eq!(deltas(&outputs), "a } b { c");
        assert_eq!(completed(&outputs).len(), 1);
    }

    #[test]
    fn test_unknown_next_speaker_is_invalid() {
        let outputs = feed(&[r#"{"utterance":"hi","next_speaker":"zed"}"#]);
        assert!(completed(&outputs).is_empty());
        assert_eq!(deltas(&outputs), "hi");
        assert!(matches!(
            outputs.last(),
            Some(ParserOutput::Invalid(detail)) if detail.contains("zed")
        ));
    }

    #[test]
    fn test_malformed_object_is_invalid() {
        let outputs = feed(&[r#"{"utterance": "hi" "next_speaker": "a"}"#]);
        assert!(matches!(
            outputs.last(),
            Some(ParserOutput::Invalid(detail)) if detail.starts_with("malformed turn directive")
        ));
    }

    #[test]
    fn test_blank_utterance_is_invalid() {
        let outputs = feed(&[r#"{"utterance":"  ","next_speaker":"a"}"#]);
        assert!(completed(&outputs).is_empty());
        assert!(matches!(outputs.last(), Some(ParserOutput::Invalid(_))));
    }

    #[test]
    fn test_end_of_stream_without_object() {
        let mut parser = parser();
        assert!(parser.push("no json here").is_empty());
        assert_eq!(
            parser.finish(),
            vec![ParserOutput::Invalid(INCOMPLETE_DIRECTIVE.to_string())]
        );
    }

    #[test]
    fn test_end_of_stream_mid_object_flushes_first() {
        let mut parser = parser();
        assert_eq!(
            parser.push(r#"{"utterance":"half"#),
            vec![ParserOutput::Delta("half".to_string())]
        );
        assert_eq!(
            parser.finish(),
            vec![ParserOutput::Invalid(INCOMPLETE_DIRECTIVE.to_string())]
        );
    }

    #[test]
    fn test_repeated_utterance_key_is_invalid() {
        let outputs = feed(&[
            r#"{"utterance":"first","next_speaker":"a","utterance":"second"}"#,
        ]);
        assert_eq!(deltas(&outputs), "first");
        assert!(completed(&outputs).is_empty());
        assert_eq!(
            outputs.last(),
            Some(&ParserOutput::Invalid(DUPLICATE_UTTERANCE.to_string()))
        );
    }

    #[test]
    fn test_utterance_inside_nested_value_is_not_a_repeat() {
        let outputs = feed(&[
            r#"{"utterance":"hi","meta":{"utterance":"x"},"next_speaker":"b"}"#,
        ]);
        assert_eq!(completed(&outputs)[0].utterance, "hi");
    }

    #[test]
    fn test_extra_keys_are_ignored() {
        let outputs = feed(&[
            r#"{"utterance":"hi","next_speaker":"a","confidence":0.9,"tags":["x","}"]}"#,
        ]);
        assert_eq!(completed(&outputs)[0].utterance, "hi");
    }
}
