/*
 * boundary.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Sbusta, a streaming MIME decomposition engine.
 *
 * Sbusta is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Sbusta is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Sbusta.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Boundary tokens (RFC 2046), the per-parse boundary stack, and region terminations.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Checks if a character is legal in a multipart boundary token (RFC 2046).
#[inline]
pub fn is_token_char(c: u8) -> bool {
    matches!(c,
        b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z' |
        b'(' | b')' | b'+' | b'_' | b',' | b'-' | b'.' |
        b'/' | b':' | b'=' | b'?' | b' '
    )
}

/// Validates a boundary token: 1-70 chars from the legal set, not ending
/// in a space (RFC 2046).
pub fn is_valid_token(token: &str) -> bool {
    let b = token.as_bytes();
    (1..=70).contains(&b.len()) && b.iter().copied().all(is_token_char) && !b.ends_with(b" ")
}

/// Synthesize a fresh boundary token, unique within the process. Used when
/// a declared boundary is missing or illegal.
pub fn synthesize_token() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("----=_sbusta_{}_{}", n, random_hex(12))
}

/// Best-effort random hex string; the counter above guarantees uniqueness
/// even if the entropy source fails.
pub(crate) fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; (len + 1) / 2];
    let _ = getrandom::getrandom(&mut bytes);
    let mut s: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    s.truncate(len);
    s
}

/// Result of one reader pass over a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Saw `--token`: another part follows at the level owning `token`.
    Delim(String),
    /// Saw `--token--`: the level owning `token` has no more parts.
    Close(String),
    /// Saw a registered explicit terminator line.
    Done(String),
    Eof,
}

/// Ordered stack of active boundary tokens, innermost first, plus any
/// explicit terminator literals registered for this parse.
///
/// A nested context is derived (never destructively shared) when recursing
/// into a nested multipart: the token stack is deep-copied with the new
/// innermost token prepended, while the "last termination" cell stays one
/// shared slot for the whole parse so an ancestor-owned match observed by
/// the innermost reader is visible to the level that owns it.
#[derive(Clone)]
pub struct BoundaryContext {
    tokens: Vec<String>,
    terminators: Vec<String>,
    last: Rc<RefCell<Option<Termination>>>,
}

impl BoundaryContext {
    pub fn new() -> Self {
        Self {
            tokens: Vec::new(),
            terminators: Vec::new(),
            last: Rc::new(RefCell::new(None)),
        }
    }

    /// Derive the context for one nesting level deeper.
    pub fn nested(&self, token: &str) -> Self {
        let mut tokens = Vec::with_capacity(self.tokens.len() + 1);
        tokens.push(token.to_string());
        tokens.extend(self.tokens.iter().cloned());
        Self {
            tokens,
            terminators: self.terminators.clone(),
            last: self.last.clone(),
        }
    }

    /// Register an explicit terminator line (matched after EOL strip and
    /// trailing-whitespace strip, like boundary lines).
    pub fn add_terminator(&mut self, line: impl Into<String>) {
        self.terminators.push(line.into());
    }

    pub fn innermost(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn depth(&self) -> usize {
        self.tokens.len()
    }

    /// True when a Delim/Close termination belongs to an ancestor level,
    /// not the innermost one of this context.
    pub fn is_external(&self, t: &Termination) -> bool {
        match t {
            Termination::Delim(tok) | Termination::Close(tok) => {
                self.innermost() != Some(tok.as_str())
            }
            _ => false,
        }
    }

    pub fn set_last(&self, t: Termination) {
        *self.last.borrow_mut() = Some(t);
    }

    pub fn last(&self) -> Option<Termination> {
        self.last.borrow().clone()
    }

    /// Classify one line (already stripped of its terminator) against every
    /// active token and terminator literal. Trailing whitespace is ignored,
    /// treated as gateway-added noise; everything else must match exactly,
    /// including case.
    pub fn classify(&self, line: &[u8]) -> Option<Termination> {
        let mut end = line.len();
        while end > 0 && (line[end - 1] == b' ' || line[end - 1] == b'\t') {
            end -= 1;
        }
        let line = &line[..end];
        if line.starts_with(b"--") {
            let rest = &line[2..];
            for tok in &self.tokens {
                let t = tok.as_bytes();
                if rest.len() == t.len() + 2 && &rest[..t.len()] == t && &rest[t.len()..] == b"--" {
                    return Some(Termination::Close(tok.clone()));
                }
                if rest == t {
                    return Some(Termination::Delim(tok.clone()));
                }
            }
        }
        for lit in &self.terminators {
            if line == lit.as_bytes() {
                return Some(Termination::Done(lit.clone()));
            }
        }
        None
    }
}

impl Default for BoundaryContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_legality() {
        assert!(is_valid_token("simple boundary"));
        assert!(is_valid_token("gc0p4Jq0M:2Yt08j34c0p"));
        assert!(is_valid_token("=_NextPart_000"));
        assert!(!is_valid_token(""));
        assert!(!is_valid_token("ends with space "));
        assert!(!is_valid_token("bad\"quote"));
        assert!(!is_valid_token(&"x".repeat(71)));
    }

    #[test]
    fn synthesized_tokens_are_legal_and_distinct() {
        let a = synthesize_token();
        let b = synthesize_token();
        assert!(is_valid_token(&a));
        assert_ne!(a, b);
    }

    #[test]
    fn classify_exact_match_only() {
        let ctx = BoundaryContext::new().nested("sep");
        assert_eq!(ctx.classify(b"--sep"), Some(Termination::Delim("sep".into())));
        assert_eq!(ctx.classify(b"--sep--"), Some(Termination::Close("sep".into())));
        // Trailing whitespace is gateway noise.
        assert_eq!(ctx.classify(b"--sep  \t"), Some(Termination::Delim("sep".into())));
        assert_eq!(ctx.classify(b"--sep-- "), Some(Termination::Close("sep".into())));
        // Anything else differing is not a match.
        assert_eq!(ctx.classify(b"--Sep"), None);
        assert_eq!(ctx.classify(b"--sepx"), None);
        assert_eq!(ctx.classify(b"--se"), None);
        assert_eq!(ctx.classify(b" --sep"), None);
        assert_eq!(ctx.classify(b"--sep---"), None);
    }

    #[test]
    fn classify_sees_ancestor_tokens() {
        let outer = BoundaryContext::new().nested("outer");
        let inner = outer.nested("inner");
        assert_eq!(inner.innermost(), Some("inner"));
        assert_eq!(inner.depth(), 2);
        let t = inner.classify(b"--outer").unwrap();
        assert_eq!(t, Termination::Delim("outer".into()));
        assert!(inner.is_external(&t));
        assert!(!inner.is_external(&Termination::Delim("inner".into())));
        // The outer context was not mutated by derivation.
        assert_eq!(outer.depth(), 1);
        assert!(outer.classify(b"--inner").is_none());
    }

    #[test]
    fn last_termination_cell_is_shared_across_levels() {
        let outer = BoundaryContext::new().nested("outer");
        let inner = outer.nested("inner");
        inner.set_last(Termination::Close("outer".into()));
        assert_eq!(outer.last(), Some(Termination::Close("outer".into())));
    }

    #[test]
    fn explicit_terminator_literal() {
        let mut ctx = BoundaryContext::new();
        ctx.add_terminator("*** EOOH ***");
        assert_eq!(
            ctx.classify(b"*** EOOH ***"),
            Some(Termination::Done("*** EOOH ***".into()))
        );
        assert_eq!(ctx.classify(b"*** EOOH"), None);
    }
}
