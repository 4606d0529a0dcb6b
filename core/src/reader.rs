/*
 * reader.rs
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

//! Boundary-aware region reader: one-line-lookahead classifier over a boundary stack.

use std::io::SeekFrom;

use crate::boundary::{BoundaryContext, Termination};
use crate::error::MimeError;
use crate::io::MimeIo;

/// Strip one trailing line terminator: CRLF, LFCR, CR or LF.
pub fn trim_eol(line: &[u8]) -> &[u8] {
    let n = line.len();
    if n >= 2 && (&line[n - 2..] == b"\r\n" || &line[n - 2..] == b"\n\r") {
        &line[..n - 2]
    } else if n >= 1 && (line[n - 1] == b'\n' || line[n - 1] == b'\r') {
        &line[..n - 1]
    } else {
        line
    }
}

/// Reads one region of the input: every line up to (not including) the
/// first line matching a boundary or terminator in the active context.
///
/// Body lines come out with their terminator normalized to a single LF.
/// The line *preceding* a boundary loses its terminator entirely (the final
/// line of a part has no trailing newline, RFC 2046), which is why the
/// reader holds one line of lookahead: whether to keep the EOL is only
/// knowable once the following line has been classified.
///
/// The matching boundary line itself is consumed, never re-read: when the
/// match belongs to an ancestor level, the shared last-termination cell
/// carries it upward and the ancestor resumes immediately after.
///
/// Implements `MimeIo` on the read side so a codec can stream the region
/// directly; past the boundary it reports end of stream.
pub struct BoundaryReader<'a> {
    input: &'a mut dyn MimeIo,
    ctx: BoundaryContext,
    held: Option<Vec<u8>>,
    finished: Option<Termination>,
    spill: Vec<u8>,
    spill_pos: usize,
}

impl<'a> BoundaryReader<'a> {
    pub fn new(input: &'a mut dyn MimeIo, ctx: &BoundaryContext) -> Self {
        Self {
            input,
            ctx: ctx.clone(),
            held: None,
            finished: None,
            spill: Vec::new(),
            spill_pos: 0,
        }
    }

    /// The termination observed, once the region is exhausted.
    pub fn termination(&self) -> Option<&Termination> {
        self.finished.as_ref()
    }

    /// Copy the whole region to `out`, returning how it ended.
    pub fn copy_to(&mut self, out: &mut dyn MimeIo) -> Result<Termination, MimeError> {
        while let Some(line) = self.next_region_line()? {
            out.print(&line)?;
        }
        Ok(self.finished.clone().unwrap_or(Termination::Eof))
    }

    fn next_region_line(&mut self) -> Result<Option<Vec<u8>>, MimeError> {
        if self.finished.is_some() {
            return Ok(None);
        }
        loop {
            match self.input.getline()? {
                None => {
                    self.finish(Termination::Eof);
                    return Ok(self.held.take());
                }
                Some(raw) => {
                    let trimmed = trim_eol(&raw);
                    if let Some(term) = self.ctx.classify(trimmed) {
                        self.finish(term);
                        // Drop the EOL of the line preceding the boundary.
                        return Ok(self.held.take().map(|mut h| {
                            if h.last() == Some(&b'\n') {
                                h.pop();
                            }
                            h
                        }));
                    }
                    let mut norm = trimmed.to_vec();
                    if raw.len() != trimmed.len() {
                        norm.push(b'\n');
                    }
                    match self.held.replace(norm) {
                        Some(prev) => return Ok(Some(prev)),
                        None => continue,
                    }
                }
            }
        }
    }

    fn finish(&mut self, term: Termination) {
        self.ctx.set_last(term.clone());
        self.finished = Some(term);
    }
}

impl MimeIo for BoundaryReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, MimeError> {
        if self.spill_pos >= self.spill.len() {
            match self.next_region_line()? {
                Some(line) => {
                    self.spill = line;
                    self.spill_pos = 0;
                }
                None => return Ok(0),
            }
        }
        let avail = &self.spill[self.spill_pos..];
        let n = avail.len().min(buf.len());
        buf[..n].copy_from_slice(&avail[..n]);
        self.spill_pos += n;
        Ok(n)
    }

    fn getline(&mut self) -> Result<Option<Vec<u8>>, MimeError> {
        // Serve any partially read() line first; it still ends at the same
        // line break the spill buffer did.
        if self.spill_pos < self.spill.len() {
            let rest = self.spill[self.spill_pos..].to_vec();
            self.spill_pos = self.spill.len();
            return Ok(Some(rest));
        }
        self.next_region_line()
    }

    fn print(&mut self, _data: &[u8]) -> Result<(), MimeError> {
        Err(MimeError::misuse("print on a region reader"))
    }

    fn close(&mut self) -> Result<(), MimeError> {
        // The underlying input is borrowed, not owned; nothing to release.
        Ok(())
    }

    fn seek(&mut self, _pos: SeekFrom) -> Result<u64, MimeError> {
        Err(MimeError::misuse("seek on a region reader"))
    }

    fn tell(&mut self) -> Result<u64, MimeError> {
        Err(MimeError::misuse("tell on a region reader"))
    }
}
