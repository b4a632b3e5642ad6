//! Accessor path parser.
//!
//! Syntax:
//! - `name` - a member of the current value
//! - `a.b.c` - chained members
//! - `items[0]` - index into a list
//! - `props['key']`, `props["key"]`, `props[key]` - key lookup into a map
//! - `grid[1][2]` - consecutive brackets

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use crate::error::{Error, Result};

/// One segment of an accessor path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Member name (field, getter or method).
    Name(String),
    /// Integer literal inside brackets.
    Index(i64),
    /// Non-integer literal inside brackets.
    Key(String),
}

impl Segment {
    /// Returns true for bracketed segments.
    pub fn is_bracket(&self) -> bool {
        !matches!(self, Segment::Name(_))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Name(n) => f.write_str(n),
            Segment::Index(i) => write!(f, "[{}]", i),
            Segment::Key(k) => write!(f, "['{}']", k),
        }
    }
}

/// A parsed accessor path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessorPath {
    text: String,
    segments: Vec<Segment>,
}

impl AccessorPath {
    /// Parses an accessor path.
    pub fn parse(input: &str) -> Result<Self> {
        let mut parser = Parser::new(input);
        let segments = parser.parse_segments()?;
        Ok(Self {
            text: input.trim().to_string(),
            segments,
        })
    }

    /// Builds a path from already-split segments.
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        let mut text = String::new();
        for (i, s) in segments.iter().enumerate() {
            if i > 0 && !s.is_bracket() {
                text.push('.');
            }
            text.push_str(&s.to_string());
        }
        Self { text, segments }
    }

    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for AccessorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Parser state.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::invalid_path(
            self.input,
            alloc::format!("{} at position {}", message.into(), self.pos),
        )
    }

    fn parse_segments(&mut self) -> Result<Vec<Segment>> {
        let mut segments = Vec::new();
        self.skip_whitespace();
        if self.peek().is_none() {
            return Err(self.error("empty path"));
        }

        let mut expect_name = true;
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some('[') => {
                    self.advance();
                    segments.push(self.parse_bracket()?);
                    expect_name = false;
                }
                Some('.') if !expect_name => {
                    self.advance();
                    expect_name = true;
                    self.skip_whitespace();
                    if !matches!(self.peek(), Some(c) if is_name_char(c)) {
                        return Err(self.error("expected member name after '.'"));
                    }
                }
                Some(c) if expect_name && is_name_char(c) => {
                    segments.push(Segment::Name(self.parse_identifier()));
                    expect_name = false;
                }
                Some(c) => {
                    return Err(self.error(alloc::format!("unexpected '{}'", c)));
                }
            }
        }
        if expect_name && !segments.is_empty() {
            return Err(self.error("path ends with '.'"));
        }
        Ok(segments)
    }

    fn parse_identifier(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_name_char(c) {
                self.advance();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_bracket(&mut self) -> Result<Segment> {
        self.skip_whitespace();
        let segment = match self.peek() {
            Some(q @ ('\'' | '"')) => {
                self.advance();
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c == q {
                        break;
                    }
                    self.advance();
                }
                if self.peek() != Some(q) {
                    return Err(self.error("unterminated string"));
                }
                let key = self.input[start..self.pos].to_string();
                self.advance();
                Segment::Key(key)
            }
            Some(_) => {
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c == ']' {
                        break;
                    }
                    self.advance();
                }
                let literal = self.input[start..self.pos].trim();
                if literal.is_empty() {
                    return Err(self.error("empty brackets"));
                }
                match literal.parse::<i64>() {
                    Ok(i) => Segment::Index(i),
                    Err(_) => Segment::Key(literal.to_string()),
                }
            }
            None => return Err(self.error("unterminated brackets")),
        };
        self.skip_whitespace();
        if self.peek() != Some(']') {
            return Err(self.error("expected ']'"));
        }
        self.advance();
        Ok(segment)
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotted() {
        let p = AccessorPath::parse("address.city.name").unwrap();
        assert_eq!(
            p.segments(),
            &[
                Segment::Name("address".into()),
                Segment::Name("city".into()),
                Segment::Name("name".into()),
            ]
        );
        assert_eq!(p.text(), "address.city.name");
    }

    #[test]
    fn test_parse_brackets() {
        let p = AccessorPath::parse("items[0].tags['x'][\"y\"][z]").unwrap();
        assert_eq!(
            p.segments(),
            &[
                Segment::Name("items".into()),
                Segment::Index(0),
                Segment::Name("tags".into()),
                Segment::Key("x".into()),
                Segment::Key("y".into()),
                Segment::Key("z".into()),
            ]
        );
    }

    #[test]
    fn test_parse_leading_bracket() {
        let p = AccessorPath::parse("[2]").unwrap();
        assert_eq!(p.segments(), &[Segment::Index(2)]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(AccessorPath::parse("").is_err());
        assert!(AccessorPath::parse("a.").is_err());
        assert!(AccessorPath::parse("a..b").is_err());
        assert!(AccessorPath::parse("a[0").is_err());
        assert!(AccessorPath::parse("a['x]").is_err());
        assert!(AccessorPath::parse("a[]").is_err());
        assert!(AccessorPath::parse("a b").is_err());
    }

    #[test]
    fn test_from_segments_text() {
        let p = AccessorPath::from_segments(alloc::vec![
            Segment::Name("a".into()),
            Segment::Index(1),
            Segment::Name("b".into()),
        ]);
        assert_eq!(p.text(), "a[1].b");
    }
}
