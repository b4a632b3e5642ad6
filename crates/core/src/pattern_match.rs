//! LIKE pattern matching.
//!
//! Patterns use two wildcards:
//! - `%` matches zero or more characters
//! - `_` matches exactly one character
//!
//! A pattern is compiled once into literal runs separated by `%`. Matching is
//! anchored at both ends and scans segment by segment: the first run must be
//! a prefix, the last run a suffix, and every run in between is taken at its
//! leftmost position. No backtracking is needed because `%` absorbs any gap.
//!
//! ```
//! use objql_core::pattern_match::{like, LikePattern};
//! assert!(like("hello", "h%o"));
//! assert!(like("hello", "_ello"));
//! assert!(!like("hello", "world"));
//!
//! let p = LikePattern::compile("A%C", true);
//! assert!(p.matches("abc"));
//! ```

use alloc::string::String;
use alloc::vec::Vec;

/// One character position inside a literal run; `None` is the `_` wildcard.
type Run = Vec<Option<char>>;

/// A compiled LIKE pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LikePattern {
    /// Literal runs; a `%` sits between every two consecutive runs.
    runs: Vec<Run>,
    ignore_case: bool,
}

impl LikePattern {
    /// Compiles a pattern.
    pub fn compile(pattern: &str, ignore_case: bool) -> Self {
        let source = if ignore_case {
            fold(pattern)
        } else {
            String::from(pattern)
        };
        let runs = source
            .split('%')
            .map(|run| {
                run.chars()
                    .map(|c| if c == '_' { None } else { Some(c) })
                    .collect()
            })
            .collect();
        Self { runs, ignore_case }
    }

    /// Returns true if the pattern contains no `%` or `_`.
    pub fn is_literal(&self) -> bool {
        self.runs.len() == 1 && self.runs[0].iter().all(Option::is_some)
    }

    /// Matches the whole of `value` against the pattern.
    pub fn matches(&self, value: &str) -> bool {
        let folded;
        let value = if self.ignore_case {
            folded = fold(value);
            folded.as_str()
        } else {
            value
        };
        let chars: Vec<char> = value.chars().collect();

        let (first, rest) = match self.runs.split_first() {
            Some(split) => split,
            None => return chars.is_empty(),
        };
        if rest.is_empty() {
            return chars.len() == first.len() && run_matches_at(first, &chars, 0);
        }

        // Prefix
        if chars.len() < first.len() || !run_matches_at(first, &chars, 0) {
            return false;
        }
        let mut pos = first.len();

        // Suffix
        let (last, middle) = match rest.split_last() {
            Some(split) => split,
            None => return true,
        };
        if chars.len() < pos + last.len() {
            return false;
        }
        let end = chars.len() - last.len();
        if !run_matches_at(last, &chars, end) {
            return false;
        }

        // Middle runs, leftmost first, inside [pos, end)
        for run in middle {
            match find_run(run, &chars[..end], pos) {
                Some(found) => pos = found + run.len(),
                None => return false,
            }
        }
        true
    }
}

fn fold(s: &str) -> String {
    s.chars().flat_map(char::to_lowercase).collect()
}

fn run_matches_at(run: &[Option<char>], chars: &[char], at: usize) -> bool {
    if at + run.len() > chars.len() {
        return false;
    }
    run.iter()
        .zip(&chars[at..at + run.len()])
        .all(|(p, c)| p.map_or(true, |p| p == *c))
}

fn find_run(run: &[Option<char>], chars: &[char], from: usize) -> Option<usize> {
    if run.len() > chars.len() {
        return None;
    }
    (from..=chars.len() - run.len()).find(|&at| run_matches_at(run, chars, at))
}

/// Case-sensitive SQL LIKE; compiles the pattern on every call.
pub fn like(value: &str, pattern: &str) -> bool {
    LikePattern::compile(pattern, false).matches(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_exact() {
        assert!(like("hello", "hello"));
        assert!(!like("hello", "world"));
        assert!(!like("hello", "hell"));
        assert!(!like("hell", "hello"));
    }

    #[test]
    fn like_percent() {
        assert!(like("hello", "%"));
        assert!(like("hello", "h%"));
        assert!(like("hello", "%o"));
        assert!(like("hello", "h%o"));
        assert!(like("hello", "%ell%"));
        assert!(!like("hello", "x%"));
        assert!(like("abc", "a%c"));
        assert!(like("ac", "a%c"));
        assert!(!like("abD", "a%c"));
    }

    #[test]
    fn like_underscore() {
        assert!(like("hello", "_ello"));
        assert!(like("hello", "h_llo"));
        assert!(like("hello", "hell_"));
        assert!(like("hello", "_____"));
        assert!(!like("hello", "______"));
    }

    #[test]
    fn like_combined() {
        assert!(like("hello", "h%_o"));
        assert!(like("hello world", "hello%"));
        assert!(like("hello world", "%world"));
        assert!(like("abcabc", "%b_a%"));
        assert!(!like("abcab", "a%bc%bc"));
    }

    #[test]
    fn like_prefix_and_suffix_do_not_overlap() {
        assert!(!like("aba", "ab%ba"));
        assert!(like("abba", "ab%ba"));
    }

    #[test]
    fn like_empty() {
        assert!(like("", ""));
        assert!(like("", "%"));
        assert!(like("", "%%"));
        assert!(!like("", "_"));
        assert!(!like("", "a"));
    }

    #[test]
    fn like_ignore_case() {
        let p = LikePattern::compile("HeL%", true);
        assert!(p.matches("hello"));
        assert!(p.matches("HELLO"));
        assert!(!LikePattern::compile("HeL%", false).matches("hello"));
    }

    #[test]
    fn literal_detection() {
        assert!(LikePattern::compile("abc", false).is_literal());
        assert!(!LikePattern::compile("a_c", false).is_literal());
        assert!(!LikePattern::compile("a%", false).is_literal());
    }
}
