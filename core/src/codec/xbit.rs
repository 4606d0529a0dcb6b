/*
 * xbit.rs
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

//! 7bit/8bit Content-Transfer-Encoding: line-length discipline and lossy
//! 7-bit transliteration. The only codec that can lose information by
//! design; never for binary payloads.

use crate::codec::Codec;
use crate::error::MimeError;
use crate::io::MimeIo;
use crate::reader::trim_eol;

/// RFC 2821 line-length ceiling (excluding the terminator).
const MAX_LINE: usize = 990;

/// How the 7-bit encoder renders octets >= 0x80.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SevenBitStrategy {
    /// Approximate-ASCII rendering of Latin-1 (e.g. é -> e, ß -> ss).
    Approx,
    /// Clear the high bit.
    ClearBit,
    /// Drop the octet.
    Strip,
    /// HTML-entity escape (&#233;).
    Entity,
}

pub struct XbitCodec {
    seven_bit: bool,
    strategy: SevenBitStrategy,
}

impl XbitCodec {
    pub fn seven_bit(strategy: SevenBitStrategy) -> Self {
        Self {
            seven_bit: true,
            strategy,
        }
    }

    pub fn eight_bit() -> Self {
        Self {
            seven_bit: false,
            strategy: SevenBitStrategy::Approx,
        }
    }
}

impl Codec for XbitCodec {
    fn name(&self) -> &str {
        if self.seven_bit {
            "7bit"
        } else {
            "8bit"
        }
    }

    /// Pass-through except for normalizing line endings to a single LF.
    fn decode(&self, input: &mut dyn MimeIo, output: &mut dyn MimeIo) -> Result<(), MimeError> {
        while let Some(raw) = input.getline()? {
            let content = trim_eol(&raw);
            output.print(content)?;
            if content.len() != raw.len() {
                output.print(b"\n")?;
            }
        }
        Ok(())
    }

    /// Splits overlong lines at the 990-octet ceiling; in 7-bit mode first
    /// transliterates every octet >= 0x80 by the configured strategy.
    fn encode(&self, input: &mut dyn MimeIo, output: &mut dyn MimeIo) -> Result<(), MimeError> {
        let mut line = Vec::new();
        while let Some(raw) = input.getline()? {
            let content = trim_eol(&raw);
            let had_eol = content.len() != raw.len();
            line.clear();
            if self.seven_bit {
                for &b in content {
                    if b < 0x80 {
                        line.push(b);
                    } else {
                        transliterate(b, self.strategy, &mut line);
                    }
                }
            } else {
                line.extend_from_slice(content);
            }
            let mut rest = &line[..];
            while rest.len() > MAX_LINE {
                output.print(&rest[..MAX_LINE])?;
                output.print(b"\n")?;
                rest = &rest[MAX_LINE..];
            }
            output.print(rest)?;
            if had_eol {
                output.print(b"\n")?;
            }
        }
        Ok(())
    }
}

fn transliterate(b: u8, strategy: SevenBitStrategy, out: &mut Vec<u8>) {
    match strategy {
        SevenBitStrategy::Approx => out.extend_from_slice(approximate_ascii(b).as_bytes()),
        SevenBitStrategy::ClearBit => out.push(b & 0x7F),
        SevenBitStrategy::Strip => {}
        SevenBitStrategy::Entity => {
            out.extend_from_slice(format!("&#{};", b).as_bytes());
        }
    }
}

/// Approximate-ASCII rendering of the Latin-1 upper half; anything without
/// a sensible rendering becomes `?`.
fn approximate_ascii(b: u8) -> &'static str {
    match b {
        0xA0 => " ",
        0xA1 => "!",
        0xA2 => "c",
        0xA3 => "GBP",
        0xA5 => "Y",
        0xA6 => "|",
        0xA9 => "(C)",
        0xAA => "a",
        0xAB => "<<",
        0xAD => "-",
        0xAE => "(R)",
        0xB0 => "deg",
        0xB1 => "+/-",
        0xB2 => "2",
        0xB3 => "3",
        0xB5 => "u",
        0xB7 => ".",
        0xB9 => "1",
        0xBA => "o",
        0xBB => ">>",
        0xBC => "1/4",
        0xBD => "1/2",
        0xBE => "3/4",
        0xBF => "?",
        0xC0..=0xC5 => "A",
        0xC6 => "AE",
        0xC7 => "C",
        0xC8..=0xCB => "E",
        0xCC..=0xCF => "I",
        0xD0 => "D",
        0xD1 => "N",
        0xD2..=0xD6 | 0xD8 => "O",
        0xD7 => "x",
        0xD9..=0xDC => "U",
        0xDD => "Y",
        0xDE => "Th",
        0xDF => "ss",
        0xE0..=0xE5 => "a",
        0xE6 => "ae",
        0xE7 => "c",
        0xE8..=0xEB => "e",
        0xEC..=0xEF => "i",
        0xF0 => "d",
        0xF1 => "n",
        0xF2..=0xF6 | 0xF8 => "o",
        0xF7 => "/",
        0xF9..=0xFC => "u",
        0xFD | 0xFF => "y",
        0xFE => "th",
        _ => "?",
    }
}
