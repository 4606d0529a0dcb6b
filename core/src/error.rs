/*
 * error.rs
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

//! Errors raised by readers, codecs, body stores and the parser.

use std::fmt;
use std::io;

/// Errors from the decomposition engine.
///
/// `UnsupportedEncoding` is recoverable: the caller may fall back to a
/// verbatim binary copy. `Io` and `Codec` are fatal for the entity in
/// progress. `Misuse` signals a contract violation (e.g. seeking a
/// write-opened handle) and is always a caller bug.
#[derive(Debug)]
pub enum MimeError {
    Io(io::Error),
    UnsupportedEncoding(String),
    /// A codec signalled failure; partially written output is unusable.
    Codec { name: String, detail: String },
    Misuse(String),
}

impl MimeError {
    pub fn misuse(msg: impl Into<String>) -> Self {
        MimeError::Misuse(msg.into())
    }

    pub fn codec(name: impl Into<String>, detail: impl Into<String>) -> Self {
        MimeError::Codec {
            name: name.into(),
            detail: detail.into(),
        }
    }

    /// True for conditions a caller is expected to handle with a fallback
    /// rather than abort the parse.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MimeError::UnsupportedEncoding(_))
    }
}

impl fmt::Display for MimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MimeError::Io(e) => write!(f, "I/O error: {}", e),
            MimeError::UnsupportedEncoding(name) => {
                write!(f, "unsupported encoding: {}", name)
            }
            MimeError::Codec { name, detail } => write!(f, "{} codec: {}", name, detail),
            MimeError::Misuse(msg) => write!(f, "misuse: {}", msg),
        }
    }
}

impl std::error::Error for MimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MimeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MimeError {
    fn from(e: io::Error) -> Self {
        MimeError::Io(e)
    }
}
