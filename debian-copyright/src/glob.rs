// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! DEP-5 glob patterns.

The glob dialect used by `Files` paragraphs is not POSIX. `*` matches any run of
characters (including `/` and the empty run), `?` matches exactly one character
and `\` escapes one of `\`, `*` or `?`. Every other character matches itself.
Patterns are anchored at both ends.

See <https://www.debian.org/doc/packaging-manuals/copyright-format/1.0/#files-field>.
*/

use {
    crate::error::{CopyrightError, Result},
    std::fmt::{Display, Formatter},
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Token {
    Literal(char),
    AnyOne,
    AnyRun,
}

/// A tokenized DEP-5 glob pattern.
///
/// Construct instances with [GlobPattern::parse] once and match many paths against them.
/// Escape errors are reported at parse time so matching itself cannot fail.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GlobPattern {
    source: String,
    tokens: Vec<Token>,
}

impl GlobPattern {
    /// Parse a pattern string.
    pub fn parse(pattern: &str) -> Result<Self> {
        let mut tokens = Vec::with_capacity(pattern.len());
        let mut chars = pattern.chars();

        while let Some(c) = chars.next() {
            tokens.push(match c {
                '\\' => match chars.next() {
                    Some(escaped @ ('\\' | '*' | '?')) => Token::Literal(escaped),
                    Some(escaped) => return Err(CopyrightError::GlobIllegalEscape(escaped)),
                    None => return Err(CopyrightError::GlobTrailingEscape(pattern.to_string())),
                },
                '*' => Token::AnyRun,
                '?' => Token::AnyOne,
                c => Token::Literal(c),
            });
        }

        Ok(Self {
            source: pattern.to_string(),
            tokens,
        })
    }

    /// The pattern as originally written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the entire `path` matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        let path = path.chars().collect::<Vec<_>>();

        match_tokens(&self.tokens, &path)
    }
}

impl Display for GlobPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// Match a single path against a pattern string.
///
/// Prefer [GlobPattern] when matching many paths against the same pattern.
pub fn glob_match(pattern: &str, path: &str) -> Result<bool> {
    Ok(GlobPattern::parse(pattern)?.matches(path))
}

fn match_tokens(tokens: &[Token], path: &[char]) -> bool {
    let (token, tokens) = match tokens.split_first() {
        Some(v) => v,
        None => return path.is_empty(),
    };

    match token {
        Token::Literal(c) => path.first() == Some(c) && match_tokens(tokens, &path[1..]),
        Token::AnyOne => !path.is_empty() && match_tokens(tokens, &path[1..]),
        Token::AnyRun => match_any_run(tokens, path),
    }
}

/// Match the remainder of a pattern following a `*`.
///
/// Instead of trying every split point of `path`, subsequent tokens are consumed here.
/// A literal anchors the search to positions holding that character. A `?` just shifts
/// the start of the remaining path and keeps the wildcard open.
fn match_any_run(mut tokens: &[Token], mut path: &[char]) -> bool {
    loop {
        let (token, rest) = match tokens.split_first() {
            Some(v) => v,
            None => return true,
        };
        tokens = rest;

        match token {
            Token::AnyRun => {}
            Token::AnyOne => {
                if path.is_empty() {
                    return false;
                }
                path = &path[1..];
            }
            Token::Literal(c) => {
                return path
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| *p == c)
                    .any(|(i, _)| match_tokens(tokens, &path[i + 1..]));
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn star_matches_everything() -> Result<()> {
        for path in ["", "a", "debian/rules", "src/deep/nested/file.c", "*?\\"] {
            assert!(glob_match("*", path)?, "{}", path);
        }

        Ok(())
    }

    #[test]
    fn question_mark() -> Result<()> {
        assert!(glob_match("a?c", "abc")?);
        assert!(!glob_match("a?c", "ac")?);
        assert!(!glob_match("a?c", "abbc")?);
        assert!(glob_match("?", "é")?);

        Ok(())
    }

    #[test]
    fn anchored() -> Result<()> {
        assert!(glob_match("src/*.c", "src/main.c")?);
        assert!(glob_match("src/*.c", "src/sub/dir/main.c")?);
        assert!(!glob_match("src/*.c", "src/main.cc")?);
        assert!(!glob_match("src/*.c", "vendor/src/main.c")?);
        assert!(!glob_match("abc", "abcd")?);
        assert!(!glob_match("abc", "ab")?);
        assert!(glob_match("", "")?);
        assert!(!glob_match("", "a")?);

        Ok(())
    }

    #[test]
    fn escapes() -> Result<()> {
        assert!(glob_match("\\*", "*")?);
        assert!(!glob_match("\\*", "a")?);
        assert!(glob_match("\\?", "?")?);
        assert!(!glob_match("\\?", "x")?);
        assert!(glob_match("a\\\\b", "a\\b")?);

        assert!(matches!(
            GlobPattern::parse("\\a"),
            Err(CopyrightError::GlobIllegalEscape('a'))
        ));
        assert!(matches!(
            GlobPattern::parse("foo\\"),
            Err(CopyrightError::GlobTrailingEscape(_))
        ));

        Ok(())
    }

    #[test]
    fn star_followed_by_question_mark() -> Result<()> {
        assert!(glob_match("*?", "a")?);
        assert!(!glob_match("*?", "")?);
        assert!(glob_match("a*?c", "abc")?);
        assert!(glob_match("a*?c", "abbbc")?);
        assert!(!glob_match("a*?c", "ac")?);
        assert!(glob_match("*??*x", "abx")?);
        assert!(!glob_match("*??*x", "bx")?);

        Ok(())
    }

    #[test]
    fn backtracks_over_repeated_literals() -> Result<()> {
        assert!(glob_match("*a*b", "aaab")?);
        assert!(glob_match("*/debian/*", "pkg/debian/debian/rules")?);
        assert!(!glob_match("*a*b", "bbba")?);

        Ok(())
    }

    #[test]
    fn dense_wildcards_terminate() -> Result<()> {
        let path = "z".repeat(4096) + "b";
        assert!(!glob_match("********a", &path)?);
        assert!(glob_match("********b", &path)?);

        let pattern = GlobPattern::parse(&"*".repeat(200))?;
        assert!(pattern.matches(&path));

        Ok(())
    }

    #[test]
    fn display_preserves_source() -> Result<()> {
        let pattern = GlobPattern::parse("debian/\\*.patch")?;
        assert_eq!(pattern.to_string(), "debian/\\*.patch");
        assert_eq!(pattern.as_str(), "debian/\\*.patch");

        Ok(())
    }
}
