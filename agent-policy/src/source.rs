//! Lexical view of Python source used by the static scanner.
//!
//! The scanner never parses Python fully. It works on a masked copy of the
//! source where comment bytes become spaces and string-literal contents
//! become `_`, so pattern matching only ever sees code. The masked copy has
//! the same byte length as the original, which keeps offsets and line
//! numbers shared between the two.
//!
//! f-strings are left unmasked: their interpolations are code, and hiding
//! them would let forbidden calls slip past the scan.

/// Source text paired with its masked copy.
#[derive(Debug, Clone)]
pub(crate) struct MaskedSource<'a> {
    original: &'a str,
    masked: String,
    line_starts: Vec<usize>,
}

/// One logical line: physical lines joined by open brackets or `\`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LogicalLine {
    /// 1-based physical line where the logical line starts.
    pub line: usize,
    /// Width of the leading indentation.
    pub indent: usize,
    /// Masked text with the indentation removed and newlines preserved.
    pub text: String,
    /// Byte offset of `text` within the source.
    pub offset: usize,
}

impl<'a> MaskedSource<'a> {
    pub(crate) fn new(original: &'a str) -> Self {
        let masked = mask(original);
        let mut line_starts = vec![0];
        line_starts.extend(
            original
                .bytes()
                .enumerate()
                .filter(|(_, byte)| *byte == b'\n')
                .map(|(index, _)| index + 1),
        );
        Self {
            original,
            masked,
            line_starts,
        }
    }

    pub(crate) fn original(&self) -> &'a str {
        self.original
    }

    pub(crate) fn masked(&self) -> &str {
        &self.masked
    }

    /// 1-based line number of a byte offset.
    pub(crate) fn line_of(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(index) => index + 1,
            Err(index) => index,
        }
    }

    /// Splits the masked source into logical lines, skipping blank ones.
    pub(crate) fn logical_lines(&self) -> Vec<LogicalLine> {
        let bytes = self.masked.as_bytes();
        let mut lines = Vec::new();
        let mut start = 0;
        let mut depth: usize = 0;
        let mut index = 0;
        while index < bytes.len() {
            match bytes[index] {
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                b'\n' => {
                    let before = if index > 1 && bytes[index - 1] == b'\r' {
                        index - 2
                    } else {
                        index.saturating_sub(1)
                    };
                    let continued = index > 0 && bytes[before] == b'\\';
                    if depth == 0 && !continued {
                        self.push_line(&mut lines, start, index);
                        start = index + 1;
                    }
                }
                _ => {}
            }
            index += 1;
        }
        self.push_line(&mut lines, start, bytes.len());
        lines
    }

    fn push_line(&self, lines: &mut Vec<LogicalLine>, start: usize, end: usize) {
        let raw = &self.masked[start..end];
        let trimmed_start = raw.trim_start_matches([' ', '\t']);
        let indent = raw.len() - trimmed_start.len();
        let text = trimmed_start.trim_end();
        if text.is_empty() {
            return;
        }
        lines.push(LogicalLine {
            line: self.line_of(start + indent),
            indent,
            text: text.to_owned(),
            offset: start + indent,
        });
    }
}

#[derive(Clone, Copy)]
struct StringLiteral {
    quote: u8,
    triple: bool,
    formatted: bool,
}

/// Returns a copy of `source` with comments blanked and string contents
/// replaced by `_`, preserving byte length.
pub(crate) fn mask(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = bytes.to_vec();
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'#' => {
                while index < bytes.len() && bytes[index] != b'\n' {
                    out[index] = b' ';
                    index += 1;
                }
            }
            quote @ (b'\'' | b'"') => {
                let literal = StringLiteral {
                    quote,
                    triple: bytes.get(index + 1) == Some(&quote)
                        && bytes.get(index + 2) == Some(&quote),
                    formatted: string_prefix(bytes, index)
                        .iter()
                        .any(|byte| matches!(byte, b'f' | b'F')),
                };
                index = mask_string(bytes, &mut out, index, literal);
            }
            _ => index += 1,
        }
    }
    String::from_utf8(out).unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
}

/// Letters immediately before a quote, e.g. `rb` in `rb"..."`.
fn string_prefix(bytes: &[u8], quote_index: usize) -> &[u8] {
    let mut start = quote_index;
    while start > 0 && bytes[start - 1].is_ascii_alphabetic() {
        start -= 1;
    }
    let prefix = &bytes[start..quote_index];
    let is_prefix = prefix.len() <= 2
        && prefix
            .iter()
            .all(|byte| matches!(byte.to_ascii_lowercase(), b'r' | b'b' | b'u' | b'f'));
    let detached = start == 0 || !(bytes[start - 1].is_ascii_alphanumeric() || bytes[start - 1] == b'_');
    if is_prefix && detached { prefix } else { &[] }
}

/// Masks one literal starting at `open`, returning the index after it.
fn mask_string(bytes: &[u8], out: &mut [u8], open: usize, literal: StringLiteral) -> usize {
    let delimiter = if literal.triple { 3 } else { 1 };
    let mut index = open + delimiter;
    while index < bytes.len() {
        let byte = bytes[index];
        if byte == b'\\' {
            if !literal.formatted {
                out[index] = b'_';
                if let Some(next) = out.get_mut(index + 1) {
                    *next = b'_';
                }
            } else if bytes.get(index + 1) == Some(&b'\n') {
                out[index + 1] = b'_';
            }
            index += 2;
            continue;
        }
        if byte == literal.quote {
            let closes = !literal.triple
                || (bytes.get(index + 1) == Some(&literal.quote)
                    && bytes.get(index + 2) == Some(&literal.quote));
            if closes {
                return index + delimiter;
            }
        }
        if byte == b'\n' && !literal.triple {
            // Unterminated single-line literal; resume scanning code.
            return index;
        }
        if !literal.formatted || byte == b'\n' {
            out[index] = b'_';
        }
        index += 1;
    }
    bytes.len()
}
