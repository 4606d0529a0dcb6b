/*
 * uu.rs
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

//! Classic uuencode as an `x-uuencode` codec. Not registered by default;
//! callers add it through `Registry::register`.

use crate::codec::Codec;
use crate::error::MimeError;
use crate::io::MimeIo;
use crate::reader::trim_eol;

/// Input bytes per encoded line, the traditional uuencode line width.
const LINE_BYTES: usize = 45;

pub struct UuCodec;

/// Six-bit value to uuencode character; zero maps to backtick, the
/// convention most encoders (and our decoder) use instead of a space.
fn uu_char(v: u8) -> u8 {
    if v == 0 {
        0x60
    } else {
        0x20 + v
    }
}

/// Character back to its six-bit value; tolerates both space and backtick
/// for zero.
fn uu_val(c: u8) -> u8 {
    c.wrapping_sub(0x20) & 0x3F
}

impl Codec for UuCodec {
    fn name(&self) -> &str {
        "x-uuencode"
    }

    /// Skips to the `begin` line, then decodes each counted line until the
    /// `end` marker. Input with no `begin` line is a definite failure.
    fn decode(&self, input: &mut dyn MimeIo, output: &mut dyn MimeIo) -> Result<(), MimeError> {
        let mut in_body = false;
        let mut out = Vec::with_capacity(LINE_BYTES);
        while let Some(raw) = input.getline()? {
            let line = trim_eol(&raw);
            if !in_body {
                if line.starts_with(b"begin ") {
                    in_body = true;
                }
                continue;
            }
            if line.is_empty() {
                continue;
            }
            if line == b"end" {
                return Ok(());
            }
            let count = uu_val(line[0]) as usize;
            if count == 0 {
                continue;
            }
            out.clear();
            for quad in line[1..].chunks(4) {
                let a = uu_val(quad[0]);
                let b = uu_val(*quad.get(1).unwrap_or(&0x20));
                let c = uu_val(*quad.get(2).unwrap_or(&0x20));
                let d = uu_val(*quad.get(3).unwrap_or(&0x20));
                out.push((a << 2) | (b >> 4));
                out.push((b << 4) | (c >> 2));
                out.push((c << 6) | d);
            }
            out.truncate(count);
            output.print(&out)?;
        }
        if !in_body {
            return Err(MimeError::codec("x-uuencode", "no begin line found"));
        }
        // A missing end marker after valid body lines is tolerated.
        Ok(())
    }

    /// Emits a `begin 644` preamble, one counted line per 45 input bytes,
    /// and the zero-count/`end` trailer.
    fn encode(&self, input: &mut dyn MimeIo, output: &mut dyn MimeIo) -> Result<(), MimeError> {
        output.print(b"begin 644 data\n")?;
        let mut chunk = [0u8; LINE_BYTES];
        loop {
            let mut n = 0;
            while n < LINE_BYTES {
                let r = input.read(&mut chunk[n..])?;
                if r == 0 {
                    break;
                }
                n += r;
            }
            if n == 0 {
                break;
            }
            let mut line = Vec::with_capacity(LINE_BYTES / 3 * 4 + 2);
            line.push(uu_char(n as u8));
            for t in chunk[..n].chunks(3) {
                let b0 = t[0];
                let b1 = *t.get(1).unwrap_or(&0);
                let b2 = *t.get(2).unwrap_or(&0);
                line.push(uu_char(b0 >> 2));
                line.push(uu_char(((b0 << 4) | (b1 >> 4)) & 0x3F));
                line.push(uu_char(((b1 << 2) | (b2 >> 6)) & 0x3F));
                line.push(uu_char(b2 & 0x3F));
            }
            line.push(b'\n');
            output.print(&line)?;
            if n < LINE_BYTES {
                break;
            }
        }
        output.print(b"`\nend\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::BufferIo;

    fn decode_all(encoded: &[u8]) -> Result<Vec<u8>, MimeError> {
        let mut input = BufferIo::reader(encoded.to_vec());
        let mut output = BufferIo::writer();
        UuCodec.decode(&mut input, &mut output)?;
        Ok(output.bytes())
    }

    fn encode_all(raw: &[u8]) -> Vec<u8> {
        let mut input = BufferIo::reader(raw.to_vec());
        let mut output = BufferIo::writer();
        UuCodec.encode(&mut input, &mut output).unwrap();
        output.bytes()
    }

    #[test]
    fn decode_known_vector() {
        let enc = b"begin 644 cat.txt\n#0V%T\n`\nend\n";
        assert_eq!(decode_all(enc).unwrap(), b"Cat");
    }

    #[test]
    fn encode_known_vector() {
        let enc = encode_all(b"Cat");
        assert_eq!(enc, b"begin 644 data\n#0V%T\n`\nend\n");
    }

    #[test]
    fn decode_skips_surrounding_text() {
        let enc = b"Here is the file you asked for.\n\
                    begin 644 cat.txt\n\
                    #0V%T\n\
                    `\n\
                    end\n\
                    Regards.\n";
        assert_eq!(decode_all(enc).unwrap(), b"Cat");
    }

    #[test]
    fn decode_without_begin_is_a_codec_error() {
        let err = decode_all(b"just some text\n").unwrap_err();
        assert!(matches!(err, MimeError::Codec { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn roundtrip_arbitrary_lengths() {
        for len in [0usize, 1, 2, 3, 44, 45, 46, 90, 255, 1000] {
            let data: Vec<u8> = (0..len).map(|i| (i * 11 + 3) as u8).collect();
            assert_eq!(decode_all(&encode_all(&data)).unwrap(), data, "len {}", len);
        }
    }

    #[test]
    fn zero_bytes_use_backtick_mapping() {
        let data = vec![0u8; 10];
        let enc = encode_all(&data);
        assert!(enc.windows(4).any(|w| w == b"````"));
        assert_eq!(decode_all(&enc).unwrap(), data);
    }
}
