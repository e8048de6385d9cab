//! Glob matching for `scan` patterns.
//!
//! Supported syntax:
//! - `*` matches any run of bytes, including none
//! - `?` matches exactly one byte
//! - `[abc]`, `[a-z]`, `[^abc]` match one byte from (or outside) a class
//! - `\x` matches `x` literally
//!
//! Matching works on raw bytes, so keys need not be valid UTF-8.
//!
//! `scan` matches while holding a shard's read lock, so the matcher never
//! backtracks further than the most recent `*`. That bounds a match to
//! O(pattern length × key length) whatever the pattern looks like.

/// A compiled glob pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glob {
    pattern: Vec<u8>,
}

impl Glob {
    /// Compiles `pattern`.
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.as_bytes().to_vec(),
        }
    }

    /// Returns true when the pattern matches every key.
    pub fn is_match_all(&self) -> bool {
        !self.pattern.is_empty() && self.pattern.iter().all(|&b| b == b'*')
    }

    /// Tests `key` against the pattern.
    pub fn matches(&self, key: &[u8]) -> bool {
        let pattern = self.pattern.as_slice();
        let (mut p, mut t) = (0usize, 0usize);
        // Pattern index just past the last `*`, and where in the key it resumes
        let mut star: Option<(usize, usize)> = None;

        while t < key.len() {
            if pattern.get(p) == Some(&b'*') {
                p += 1;
                star = Some((p, t));
                continue;
            }

            if let Some((true, len)) = match_token(pattern, p, key[t]) {
                p += len;
                t += 1;
                continue;
            }

            // Let the last `*` swallow one more byte and retry from there
            match star {
                Some((star_p, star_t)) => {
                    p = star_p;
                    t = star_t + 1;
                    star = Some((star_p, t));
                }
                None => return false,
            }
        }

        pattern[p.min(pattern.len())..].iter().all(|&b| b == b'*')
    }
}

/// Matches the single-byte token starting at `pattern[p]` against `c`.
///
/// Returns whether it matched and how many pattern bytes the token spans,
/// or None at the end of the pattern or on an unterminated class.
fn match_token(pattern: &[u8], p: usize, c: u8) -> Option<(bool, usize)> {
    match *pattern.get(p)? {
        b'?' => Some((true, 1)),
        b'[' => match_class(&pattern[p + 1..], c).map(|(matched, len)| (matched, len + 1)),
        b'\\' if p + 1 < pattern.len() => Some((pattern[p + 1] == c, 2)),
        literal => Some((literal == c, 1)),
    }
}

/// Evaluates a `[...]` class against `c`. `class` starts just after `[`.
///
/// Returns whether `c` matched and the number of bytes up to and including
/// `]`, or None when the class is unterminated.
fn match_class(class: &[u8], c: u8) -> Option<(bool, usize)> {
    let (negate, mut i) = match class.first() {
        Some(b'^') => (true, 1),
        _ => (false, 0),
    };

    let mut matched = false;
    while i < class.len() && class[i] != b']' {
        if class[i] == b'\\' && i + 1 < class.len() {
            i += 1;
            matched |= class[i] == c;
        } else if i + 2 < class.len() && class[i + 1] == b'-' && class[i + 2] != b']' {
            let (lo, hi) = (class[i].min(class[i + 2]), class[i].max(class[i + 2]));
            matched |= (lo..=hi).contains(&c);
            i += 2;
        } else {
            matched |= class[i] == c;
        }
        i += 1;
    }

    if i >= class.len() {
        return None;
    }

    Some((matched != negate, i + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_star_and_question() {
        let glob = Glob::new("h*llo");
        assert!(glob.matches(b"hello"));
        assert!(glob.matches(b"hllo"));
        assert!(glob.matches(b"heeeello"));
        assert!(!glob.matches(b"world"));

        let glob = Glob::new("h?llo");
        assert!(glob.matches(b"hallo"));
        assert!(!glob.matches(b"hllo"));
        assert!(!glob.matches(b"heello"));
    }

    #[test]
    fn test_match_all() {
        let glob = Glob::new("*");
        assert!(glob.is_match_all());
        assert!(glob.matches(b""));
        assert!(glob.matches(b"anything"));
        assert!(!Glob::new("a*").is_match_all());
    }

    #[test]
    fn test_anchoring() {
        assert!(Glob::new("").matches(b""));
        assert!(!Glob::new("").matches(b"a"));
        assert!(!Glob::new("abc").matches(b"ab"));
        assert!(!Glob::new("ab").matches(b"abc"));
        assert!(Glob::new("ab**").matches(b"ab"));
        assert!(Glob::new("*b*d").matches(b"abcbd"));
        assert!(!Glob::new("*b*d").matches(b"abcbde"));
        assert!(Glob::new("a*?c").matches(b"abbc"));
        assert!(!Glob::new("a*?c").matches(b"ac"));
    }

    #[test]
    fn test_classes() {
        let glob = Glob::new("h[ae]llo");
        assert!(glob.matches(b"hello"));
        assert!(glob.matches(b"hallo"));
        assert!(!glob.matches(b"hillo"));

        let glob = Glob::new("key[0-3]");
        assert!(glob.matches(b"key2"));
        assert!(!glob.matches(b"key7"));

        let glob = Glob::new("h[^e]llo");
        assert!(glob.matches(b"hallo"));
        assert!(!glob.matches(b"hello"));

        assert!(Glob::new("*[xy]").matches(b"aaay"));

        // Unterminated class never matches
        assert!(!Glob::new("h[ae").matches(b"ha"));
        assert!(!Glob::new("*[ae").matches(b"ha"));
    }

    #[test]
    fn test_escape() {
        let glob = Glob::new(r"a\*b");
        assert!(glob.matches(b"a*b"));
        assert!(!glob.matches(b"axb"));

        // A trailing backslash is a literal
        assert!(Glob::new(r"a\").matches(b"a\\"));
    }

    #[test]
    fn test_non_utf8_key() {
        assert!(Glob::new("bin:*").matches(b"bin:\xff\xfe"));
    }

    #[test]
    fn test_many_stars_stay_linear() {
        let start = Instant::now();

        assert!(!Glob::new("*a*a*a*a*a*a*a*b").matches(&[b'a'; 60]));

        let long_key = vec![b'a'; 20_000];
        assert!(!Glob::new("*a*a*a*a*a*a*a*a*a*a*b").matches(&long_key));
        assert!(Glob::new("*a*a*a*a*a*a*a*a*a*a*").matches(&long_key));

        assert!(
            start.elapsed() < Duration::from_secs(2),
            "matching took {:?}",
            start.elapsed()
        );
    }
}
