//! Recursive-descent parser from filter text to a [`FilterTree`].
//!
//! Grammar (RFC 4515 subset):
//!
//! ```text
//! filter  = "(" (op | item) ")"
//! op      = "&" filter+ | "|" filter+ | "!" filter
//! item    = attr "=" value
//! attr    = one or more characters excluding =, ~, <, >, (
//! value   = segment ( "*" segment )*
//! segment = ( literal-char | "\" HEX HEX )*
//! ```

use super::{FilterTree, FilterValue, SubstringPattern};
use crate::error::AdxError;

pub fn parse_filter(input: &str) -> Result<FilterTree, AdxError> {
    let mut parser = Parser::new(input);
    let tree = parser.parse_filter()?;
    parser.skip_spaces();
    if parser.pos != parser.chars.len() {
        return Err(AdxError::FilterSyntax(
            "unexpected trailing characters in filter".to_string(),
        ));
    }
    Ok(tree)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Parser {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn parse_filter(&mut self) -> Result<FilterTree, AdxError> {
        self.skip_spaces();
        self.expect('(')?;
        self.skip_spaces();

        match self.peek()? {
            '&' => {
                self.consume();
                let children = self.parse_filter_list()?;
                self.expect(')')?;
                if children.is_empty() {
                    return Err(AdxError::FilterSyntax("empty AND expression".to_string()));
                }
                Ok(FilterTree::And(children))
            }
            '|' => {
                self.consume();
                let children = self.parse_filter_list()?;
                self.expect(')')?;
                if children.is_empty() {
                    return Err(AdxError::FilterSyntax("empty OR expression".to_string()));
                }
                Ok(FilterTree::Or(children))
            }
            '!' => {
                self.consume();
                let child = self.parse_filter()?;
                self.expect(')')?;
                Ok(FilterTree::Not(Box::new(child)))
            }
            _ => self.parse_item(),
        }
    }

    fn parse_filter_list(&mut self) -> Result<Vec<FilterTree>, AdxError> {
        let mut nodes = Vec::new();
        loop {
            self.skip_spaces();
            if self.peek_opt() != Some('(') {
                break;
            }
            nodes.push(self.parse_filter()?);
        }
        Ok(nodes)
    }

    fn parse_item(&mut self) -> Result<FilterTree, AdxError> {
        let attr = self.parse_attribute()?;
        self.expect('=')?;
        let (segments, star_count) = self.parse_value_segments()?;

        if star_count == 1 && segments.len() == 2 && segments[0].is_empty() && segments[1].is_empty() {
            self.expect(')')?;
            return Ok(FilterTree::Presence(attr));
        }

        if star_count >= 1 {
            let pattern = build_substring_pattern(&segments)?;
            self.expect(')')?;
            return Ok(FilterTree::Substring(attr, pattern));
        }

        let value = FilterValue(segments.into_iter().next().unwrap_or_default());
        self.expect(')')?;
        Ok(FilterTree::Equality(attr, value))
    }

    fn parse_attribute(&mut self) -> Result<String, AdxError> {
        let start = self.pos;
        while self.pos < self.chars.len() {
            let ch = self.chars[self.pos];
            if "=~><(".contains(ch) {
                break;
            }
            self.pos += 1;
        }
        if start == self.pos {
            return Err(AdxError::FilterSyntax("missing attribute name".to_string()));
        }
        Ok(self.chars[start..self.pos].iter().collect::<String>().trim().to_string())
    }

    fn parse_value_segments(&mut self) -> Result<(Vec<Vec<u8>>, usize), AdxError> {
        let mut segments = Vec::new();
        let mut buf: Vec<u8> = Vec::new();
        let mut star_count = 0usize;

        loop {
            if self.pos >= self.chars.len() {
                return Err(AdxError::FilterSyntax("unterminated filter value".to_string()));
            }
            let ch = self.chars[self.pos];
            if ch == ')' {
                segments.push(buf);
                break;
            }
            if ch == '*' {
                segments.push(std::mem::take(&mut buf));
                star_count += 1;
                self.pos += 1;
                continue;
            }
            if ch == '\\' {
                self.pos += 1;
                buf.push(self.parse_escape()?);
                continue;
            }
            let mut encode_buf = [0u8; 4];
            buf.extend_from_slice(ch.encode_utf8(&mut encode_buf).as_bytes());
            self.pos += 1;
        }

        Ok((segments, star_count))
    }

    fn parse_escape(&mut self) -> Result<u8, AdxError> {
        if self.pos + 2 > self.chars.len() {
            return Err(AdxError::FilterSyntax("incomplete escape sequence".to_string()));
        }
        let hex: String = self.chars[self.pos..self.pos + 2].iter().collect();
        self.pos += 2;
        u8::from_str_radix(&hex, 16)
            .map_err(|_| AdxError::FilterSyntax(format!("invalid escape sequence \\{hex}")))
    }

    fn peek(&self) -> Result<char, AdxError> {
        self.peek_opt()
            .ok_or_else(|| AdxError::FilterSyntax("unexpected end of filter".to_string()))
    }

    fn peek_opt(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn consume(&mut self) {
        self.pos += 1;
    }

    fn expect(&mut self, token: char) -> Result<(), AdxError> {
        if self.peek()? != token {
            return Err(AdxError::FilterSyntax(format!("expected '{token}'")));
        }
        self.consume();
        Ok(())
    }

    fn skip_spaces(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }
}

/// Classifies parsed `*`-delimited segments into a substring pattern: the
/// first segment is the initial anchor if non-empty, the last is the
/// final anchor if non-empty, and non-empty interior segments become the
/// ordered fragment list (empty interior segments, from consecutive `*`,
/// are dropped).
fn build_substring_pattern(segments: &[Vec<u8>]) -> Result<SubstringPattern, AdxError> {
    if segments.is_empty() {
        return Err(AdxError::FilterSyntax("malformed substring filter".to_string()));
    }

    let segments_str: Vec<String> = segments
        .iter()
        .map(|s| FilterValue(s.clone()).as_str())
        .collect();

    let initial = match segments_str.first() {
        Some(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    };
    let finale = match segments_str.last() {
        Some(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    };
    let fragments: Vec<String> = segments_str[1..segments_str.len().saturating_sub(1)]
        .iter()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect();

    Ok(SubstringPattern { initial, fragments, finale })
}
