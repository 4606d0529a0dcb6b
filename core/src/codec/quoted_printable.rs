/*
 * quoted_printable.rs
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

//! Quoted-Printable Content-Transfer-Encoding (RFC 2045 section 6.7).

use crate::codec::Codec;
use crate::error::MimeError;
use crate::io::MimeIo;
use crate::reader::trim_eol;

const HEX_DECODE: [i8; 256] = {
    let mut t = [-1i8; 256];
    let mut i = 0u8;
    while i < 10 {
        t[(b'0' + i) as usize] = i as i8;
        i += 1;
    }
    let mut i = 0u8;
    while i < 6 {
        t[(b'A' + i) as usize] = (10 + i) as i8;
        t[(b'a' + i) as usize] = (10 + i) as i8;
        i += 1;
    }
    t
};

const HEX_ENCODE: &[u8; 16] = b"0123456789ABCDEF";

/// Break encoded lines before they reach this many columns; shorter than
/// the 76-column legal maximum so a multi-character escape never has to
/// straddle a soft break.
const SOFT_BREAK_AT: usize = 70;

pub struct QuotedPrintableCodec;

impl Codec for QuotedPrintableCodec {
    fn name(&self) -> &str {
        "quoted-printable"
    }

    /// Line-by-line `=XX` expansion. A line ending in a bare `=` is a soft
    /// break (no newline in the decoded output); a terminated line is a
    /// hard break, emitted as LF.
    fn decode(&self, input: &mut dyn MimeIo, output: &mut dyn MimeIo) -> Result<(), MimeError> {
        let mut out = Vec::new();
        while let Some(raw) = input.getline()? {
            let content = trim_eol(&raw);
            let had_eol = content.len() != raw.len();
            out.clear();
            let soft = decode_line(content, &mut out);
            if had_eol && !soft {
                out.push(b'\n');
            }
            output.print(&out)?;
        }
        Ok(())
    }

    /// Escapes everything outside the printable-safe set (and trailing
    /// whitespace) as `=XX`, emitting soft breaks to hold lines under the
    /// break column. Input LFs become hard breaks; a final unterminated
    /// chunk ends with a trailing soft break so no newline is invented.
    fn encode(&self, input: &mut dyn MimeIo, output: &mut dyn MimeIo) -> Result<(), MimeError> {
        let mut col = 0usize;
        let mut at_line_start = true;
        let mut out = Vec::new();
        while let Some(raw) = input.getline()? {
            let hard = raw.last() == Some(&b'\n');
            let content = if hard { &raw[..raw.len() - 1] } else { &raw[..] };
            out.clear();
            encode_content(content, &mut col, &mut out);
            if hard {
                out.push(b'\n');
                col = 0;
                at_line_start = true;
            } else {
                at_line_start = false;
            }
            output.print(&out)?;
        }
        if !at_line_start {
            output.print(b"=\n")?;
        }
        Ok(())
    }
}

/// Decode one terminator-stripped line into `out`. Returns true when the
/// line ended with a soft break.
fn decode_line(content: &[u8], out: &mut Vec<u8>) -> bool {
    let len = content.len();
    let mut i = 0;
    while i < len {
        let b = content[i];
        if b != b'=' {
            out.push(b);
            i += 1;
            continue;
        }
        if i + 2 < len {
            let h1 = HEX_DECODE[content[i + 1] as usize];
            let h2 = HEX_DECODE[content[i + 2] as usize];
            if h1 >= 0 && h2 >= 0 {
                out.push(((h1 as u8) << 4) | (h2 as u8));
                i += 3;
                continue;
            }
        }
        if i + 1 == len {
            // Bare trailing '=': soft line break.
            return true;
        }
        // Malformed escape; keep it literally.
        out.push(b);
        i += 1;
    }
    false
}

fn is_literal(b: u8) -> bool {
    (33..=126).contains(&b) && b != b'='
}

fn encode_content(content: &[u8], col: &mut usize, out: &mut Vec<u8>) {
    let len = content.len();
    for (i, &b) in content.iter().enumerate() {
        // Whitespace is literal except at end of content, where a hard or
        // soft break follows and it must be escaped.
        let trailing = i + 1 == len;
        let literal = is_literal(b) || ((b == b' ' || b == b'\t') && !trailing);
        let width = if literal { 1 } else { 3 };
        if *col + width > SOFT_BREAK_AT {
            out.extend_from_slice(b"=\n");
            *col = 0;
        }
        if literal {
            out.push(b);
            *col += 1;
        } else {
            out.push(b'=');
            out.push(HEX_ENCODE[(b >> 4) as usize]);
            out.push(HEX_ENCODE[(b & 0x0F) as usize]);
            *col += 3;
        }
    }
}

/// RFC 2047 Q-encoding decode: `_` is space, the rest is quoted-printable.
pub(crate) fn decode_q_slice(src: &[u8]) -> Vec<u8> {
    let unscored: Vec<u8> = src
        .iter()
        .map(|&b| if b == b'_' { b' ' } else { b })
        .collect();
    let mut out = Vec::with_capacity(unscored.len());
    decode_line(&unscored, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::BufferIo;

    fn decode_all(encoded: &[u8]) -> Vec<u8> {
        let mut input = BufferIo::reader(encoded.to_vec());
        let mut output = BufferIo::writer();
        QuotedPrintableCodec.decode(&mut input, &mut output).unwrap();
        output.bytes()
    }

    fn encode_all(raw: &[u8]) -> Vec<u8> {
        let mut input = BufferIo::reader(raw.to_vec());
        let mut output = BufferIo::writer();
        QuotedPrintableCodec.encode(&mut input, &mut output).unwrap();
        output.bytes()
    }

    #[test]
    fn decode_escapes_and_soft_breaks() {
        assert_eq!(decode_all(b"a=3Db\n"), b"a=b\n");
        assert_eq!(decode_all(b"one =\ntwo\n"), b"one two\n");
        assert_eq!(decode_all(b"caf=C3=A9\n"), "café\n".as_bytes());
    }

    #[test]
    fn decode_keeps_malformed_escapes_literal() {
        assert_eq!(decode_all(b"a=ZZb\n"), b"a=ZZb\n");
        assert_eq!(decode_all(b"a=Z"), b"a=Z");
    }

    #[test]
    fn encode_escapes_controls_and_equals() {
        assert_eq!(encode_all(b"a=b\n"), b"a=3Db\n");
        assert_eq!(encode_all(b"tab\there\n"), b"tab\there\n");
        assert_eq!(encode_all(b"bell\x07\n"), b"bell=07\n");
    }

    #[test]
    fn encode_escapes_trailing_whitespace() {
        assert_eq!(encode_all(b"word \n"), b"word=20\n");
        assert_eq!(encode_all(b"word\t\n"), b"word=09\n");
    }

    #[test]
    fn encode_unterminated_tail_gets_soft_break() {
        assert_eq!(encode_all(b"no newline"), b"no newline=\n".to_vec());
    }

    #[test]
    fn encode_breaks_long_lines_softly() {
        let data = vec![b'x'; 200];
        let enc = encode_all(&data);
        for line in enc.split(|&b| b == b'\n').filter(|l| !l.is_empty()) {
            assert!(line.len() <= 76, "line too long: {}", line.len());
        }
        assert_eq!(decode_all(&enc), data);
    }

    #[test]
    fn roundtrip_arbitrary_bytes() {
        let samples: Vec<Vec<u8>> = vec![
            b"".to_vec(),
            b"plain text\n".to_vec(),
            b"no trailing newline".to_vec(),
            b"embedded\rcarriage\r\nreturns\n".to_vec(),
            (0..=255u8).collect(),
            b"trailing space \nand tab\t\n".to_vec(),
        ];
        for data in samples {
            assert_eq!(decode_all(&encode_all(&data)), data);
        }
    }
}
