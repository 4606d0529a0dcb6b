/*
 * base64.rs
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

//! Base64 Content-Transfer-Encoding (RFC 2045 section 6.8).

use crate::codec::Codec;
use crate::error::MimeError;
use crate::io::MimeIo;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const DECODE: [i8; 256] = {
    let mut t = [-1i8; 256];
    let mut i = 0u8;
    while i < 26 {
        t[(b'A' + i) as usize] = i as i8;
        t[(b'a' + i) as usize] = (26 + i) as i8;
        i += 1;
    }
    let mut i = 0u8;
    while i < 10 {
        t[(b'0' + i) as usize] = (52 + i) as i8;
        i += 1;
    }
    t[b'+' as usize] = 62;
    t[b'/' as usize] = 63;
    t
};

/// Bytes to read per encoded line: the largest multiple of 3 that keeps
/// the output within 76 columns (RFC 2045).
const ENCODE_CHUNK: usize = 45;

pub struct Base64Codec;

impl Codec for Base64Codec {
    fn name(&self) -> &str {
        "base64"
    }

    /// Accumulates base64 characters line by line, decoding every complete
    /// 4-char quantum as it arrives; non-alphabet bytes (including EOLs)
    /// are stripped. A 1-3 char leftover at end of input is right-padded
    /// with `=` and decoded.
    fn decode(&self, input: &mut dyn MimeIo, output: &mut dyn MimeIo) -> Result<(), MimeError> {
        let mut pending: Vec<u8> = Vec::new();
        let mut out = Vec::with_capacity(3072);
        while let Some(line) = input.getline()? {
            for &b in &line {
                if DECODE[b as usize] >= 0 || b == b'=' {
                    pending.push(b);
                }
            }
            let usable = pending.len() - pending.len() % 4;
            if usable > 0 {
                out.clear();
                decode_quanta(&pending[..usable], &mut out);
                output.print(&out)?;
                pending.drain(..usable);
            }
        }
        if !pending.is_empty() {
            while pending.len() % 4 != 0 {
                pending.push(b'=');
            }
            out.clear();
            decode_quanta(&pending, &mut out);
            output.print(&out)?;
        }
        Ok(())
    }

    /// Emits one encoded, newline-terminated line per 45-byte input chunk.
    fn encode(&self, input: &mut dyn MimeIo, output: &mut dyn MimeIo) -> Result<(), MimeError> {
        let mut chunk = [0u8; ENCODE_CHUNK];
        loop {
            let mut n = 0;
            while n < ENCODE_CHUNK {
                let r = input.read(&mut chunk[n..])?;
                if r == 0 {
                    break;
                }
                n += r;
            }
            if n == 0 {
                return Ok(());
            }
            let mut line = Vec::with_capacity(ENCODE_CHUNK / 3 * 4 + 5);
            encode_chunk(&chunk[..n], &mut line);
            line.push(b'\n');
            output.print(&line)?;
            if n < ENCODE_CHUNK {
                return Ok(());
            }
        }
    }
}

fn decode_quanta(src: &[u8], out: &mut Vec<u8>) {
    for q in src.chunks_exact(4) {
        let v0 = DECODE[q[0] as usize];
        let v1 = DECODE[q[1] as usize];
        if v0 < 0 || v1 < 0 {
            continue;
        }
        out.push(((v0 as u8) << 2) | ((v1 as u8) >> 4));
        let v2 = DECODE[q[2] as usize];
        if v2 < 0 {
            continue;
        }
        out.push((((v1 as u8) & 0x0F) << 4) | ((v2 as u8) >> 2));
        let v3 = DECODE[q[3] as usize];
        if v3 < 0 {
            continue;
        }
        out.push((((v2 as u8) & 0x03) << 6) | (v3 as u8));
    }
}

fn encode_chunk(src: &[u8], out: &mut Vec<u8>) {
    let mut iter = src.chunks_exact(3);
    for t in &mut iter {
        let n = ((t[0] as u32) << 16) | ((t[1] as u32) << 8) | (t[2] as u32);
        out.push(ALPHABET[(n >> 18) as usize & 0x3F]);
        out.push(ALPHABET[(n >> 12) as usize & 0x3F]);
        out.push(ALPHABET[(n >> 6) as usize & 0x3F]);
        out.push(ALPHABET[n as usize & 0x3F]);
    }
    match *iter.remainder() {
        [a] => {
            out.push(ALPHABET[(a >> 2) as usize]);
            out.push(ALPHABET[((a & 0x03) << 4) as usize]);
            out.push(b'=');
            out.push(b'=');
        }
        [a, b] => {
            out.push(ALPHABET[(a >> 2) as usize]);
            out.push(ALPHABET[(((a & 0x03) << 4) | (b >> 4)) as usize]);
            out.push(ALPHABET[((b & 0x0F) << 2) as usize]);
            out.push(b'=');
        }
        _ => {}
    }
}

/// Decode a self-contained base64 slice (used for RFC 2047 B-words).
pub(crate) fn decode_slice(src: &[u8]) -> Vec<u8> {
    let mut clean: Vec<u8> = src
        .iter()
        .copied()
        .filter(|&b| DECODE[b as usize] >= 0 || b == b'=')
        .collect();
    while clean.len() % 4 != 0 {
        clean.push(b'=');
    }
    let mut out = Vec::with_capacity(clean.len() / 4 * 3);
    decode_quanta(&clean, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::BufferIo;
    use base64::Engine as _;

    fn decode_all(encoded: &[u8]) -> Vec<u8> {
        let mut input = BufferIo::reader(encoded.to_vec());
        let mut output = BufferIo::writer();
        Base64Codec.decode(&mut input, &mut output).unwrap();
        output.bytes()
    }

    fn encode_all(raw: &[u8]) -> Vec<u8> {
        let mut input = BufferIo::reader(raw.to_vec());
        let mut output = BufferIo::writer();
        Base64Codec.encode(&mut input, &mut output).unwrap();
        output.bytes()
    }

    #[test]
    fn decode_known_vectors() {
        assert_eq!(decode_all(b"aGVsbG8="), b"hello");
        assert_eq!(decode_all(b"aGVs\r\nbG8=\r\n"), b"hello");
        assert_eq!(decode_all(b""), b"");
    }

    #[test]
    fn decode_tolerates_missing_padding() {
        assert_eq!(decode_all(b"aGVsbG8"), b"hello");
        assert_eq!(decode_all(b"aGk"), b"hi");
    }

    #[test]
    fn decode_strips_foreign_characters() {
        assert_eq!(decode_all(b"aG Vs\tbG8=\n"), b"hello");
    }

    #[test]
    fn encode_line_discipline() {
        let data = vec![0xABu8; 100];
        let enc = encode_all(&data);
        for line in enc.split(|&b| b == b'\n').filter(|l| !l.is_empty()) {
            assert!(line.len() <= 76);
        }
        assert_eq!(enc.last(), Some(&b'\n'));
    }

    #[test]
    fn roundtrip_arbitrary_lengths() {
        for len in [0usize, 1, 2, 3, 4, 44, 45, 46, 255, 1000] {
            let data: Vec<u8> = (0..len).map(|i| (i * 7 + 13) as u8).collect();
            assert_eq!(decode_all(&encode_all(&data)), data, "len {}", len);
        }
    }

    #[test]
    fn agrees_with_reference_implementation() {
        let data: Vec<u8> = (0..=255u8).collect();
        let enc = encode_all(&data);
        let stripped: Vec<u8> = enc.iter().copied().filter(|&b| b != b'\n').collect();
        let reference = base64::engine::general_purpose::STANDARD.encode(&data);
        assert_eq!(String::from_utf8(stripped).unwrap(), reference);
        let theirs = base64::engine::general_purpose::STANDARD
            .decode(reference)
            .unwrap();
        assert_eq!(decode_all(&enc), theirs);
    }

    #[test]
    fn decode_slice_for_encoded_words() {
        assert_eq!(decode_slice(b"aGVsbG8="), b"hello");
        assert_eq!(decode_slice(b"aGk"), b"hi");
    }
}
