/*
 * mod.rs
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

//! Transfer-encoding codecs (RFC 2045) and the codec registry.

mod base64;
mod binary;
mod quoted_printable;
mod uu;
mod xbit;

pub use base64::Base64Codec;
pub use binary::BinaryCodec;
pub use quoted_printable::QuotedPrintableCodec;
pub use uu::UuCodec;
pub use xbit::{SevenBitStrategy, XbitCodec};

pub(crate) use base64::decode_slice as base64_decode_slice;
pub(crate) use quoted_printable::decode_q_slice;

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::MimeError;
use crate::io::MimeIo;

/// A named bidirectional streaming transform for one transfer-encoding.
/// Codecs hold no per-stream state; `decode`/`encode` either succeed or
/// fail definitely, in which case the partially written output must be
/// treated as unusable by the caller.
pub trait Codec {
    /// Canonical lowercase name.
    fn name(&self) -> &str;

    fn decode(&self, input: &mut dyn MimeIo, output: &mut dyn MimeIo) -> Result<(), MimeError>;

    fn encode(&self, input: &mut dyn MimeIo, output: &mut dyn MimeIo) -> Result<(), MimeError>;
}

impl std::fmt::Debug for dyn Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec").field("name", &self.name()).finish()
    }
}

/// Mapping from canonical lowercase encoding name to a codec. An owned
/// value injected into each parse, so independent parses can carry
/// different registrations.
pub struct Registry {
    codecs: HashMap<String, Rc<dyn Codec>>,
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Registry pre-populated with the built-in encodings: base64,
    /// quoted-printable, 7bit, 8bit, binary, and `none` as an alias for
    /// binary.
    pub fn builtin() -> Self {
        let mut r = Self::empty();
        r.register("base64", Rc::new(Base64Codec));
        r.register("quoted-printable", Rc::new(QuotedPrintableCodec));
        r.register("7bit", Rc::new(XbitCodec::seven_bit(SevenBitStrategy::Approx)));
        r.register("8bit", Rc::new(XbitCodec::eight_bit()));
        let binary: Rc<dyn Codec> = Rc::new(BinaryCodec);
        r.register("binary", binary.clone());
        r.register("none", binary);
        r
    }

    pub fn register(&mut self, name: &str, codec: Rc<dyn Codec>) {
        self.codecs.insert(name.to_ascii_lowercase(), codec);
    }

    pub fn lookup(&self, name: &str) -> Option<Rc<dyn Codec>> {
        self.codecs.get(&name.to_ascii_lowercase()).cloned()
    }

    /// Like `lookup`, but an unknown name is the recoverable
    /// "unsupported encoding" condition.
    pub fn get(&self, name: &str) -> Result<Rc<dyn Codec>, MimeError> {
        self.lookup(name)
            .ok_or_else(|| MimeError::UnsupportedEncoding(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::BufferIo;

    #[test]
    fn builtin_names() {
        let r = Registry::builtin();
        assert_eq!(
            r.names(),
            vec!["7bit", "8bit", "base64", "binary", "none", "quoted-printable"]
        );
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let r = Registry::builtin();
        assert!(r.lookup("Base64").is_some());
        assert!(r.lookup("QUOTED-PRINTABLE").is_some());
        assert_eq!(r.lookup("none").unwrap().name(), "binary");
    }

    #[test]
    fn unknown_name_is_recoverable() {
        let r = Registry::builtin();
        let err = r.get("x-uuencode").unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(err, MimeError::UnsupportedEncoding(_)));
    }

    struct ReverseCodec;

    impl Codec for ReverseCodec {
        fn name(&self) -> &str {
            "x-reverse"
        }
        fn decode(&self, input: &mut dyn MimeIo, output: &mut dyn MimeIo) -> Result<(), MimeError> {
            let mut data = input.read_to_end()?;
            data.reverse();
            output.print(&data)
        }
        fn encode(&self, input: &mut dyn MimeIo, output: &mut dyn MimeIo) -> Result<(), MimeError> {
            self.decode(input, output)
        }
    }

    #[test]
    fn runtime_registration() {
        let mut r = Registry::builtin();
        r.register("x-reverse", Rc::new(ReverseCodec));
        let c = r.get("X-Reverse").unwrap();
        let mut input = BufferIo::reader(b"abc".to_vec());
        let mut output = BufferIo::writer();
        c.decode(&mut input, &mut output).unwrap();
        assert_eq!(output.bytes(), b"cba");
    }
}
