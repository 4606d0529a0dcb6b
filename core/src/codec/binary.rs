/*
 * binary.rs
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

//! Binary Content-Transfer-Encoding: verbatim block copy. The only codec
//! safe for arbitrary octet streams with long unterminated lines.

use crate::codec::Codec;
use crate::error::MimeError;
use crate::io::MimeIo;

const BLOCK: usize = 4096;

pub struct BinaryCodec;

impl BinaryCodec {
    fn copy(input: &mut dyn MimeIo, output: &mut dyn MimeIo) -> Result<(), MimeError> {
        let mut buf = [0u8; BLOCK];
        loop {
            let n = input.read(&mut buf)?;
            if n == 0 {
                return Ok(());
            }
            output.print(&buf[..n])?;
        }
    }
}

impl Codec for BinaryCodec {
    fn name(&self) -> &str {
        "binary"
    }

    fn decode(&self, input: &mut dyn MimeIo, output: &mut dyn MimeIo) -> Result<(), MimeError> {
        Self::copy(input, output)
    }

    fn encode(&self, input: &mut dyn MimeIo, output: &mut dyn MimeIo) -> Result<(), MimeError> {
        Self::copy(input, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::BufferIo;

    #[test]
    fn copies_verbatim_in_both_directions() {
        let data: Vec<u8> = (0..10_000).map(|i| (i % 251) as u8).collect();
        let mut input = BufferIo::reader(data.clone());
        let mut mid = BufferIo::writer();
        BinaryCodec.encode(&mut input, &mut mid).unwrap();
        let mut back = BufferIo::reader(mid.bytes());
        let mut output = BufferIo::writer();
        BinaryCodec.decode(&mut back, &mut output).unwrap();
        assert_eq!(output.bytes(), data);
    }

    #[test]
    fn empty_input_is_empty_output() {
        let mut input = BufferIo::reader(Vec::new());
        let mut output = BufferIo::writer();
        BinaryCodec.decode(&mut input, &mut output).unwrap();
        assert!(output.bytes().is_empty());
    }
}
