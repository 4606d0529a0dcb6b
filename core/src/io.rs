/*
 * io.rs
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

//! Uniform I/O handle: line-oriented byte stream over memory, files, or filter commands.

use std::cell::RefCell;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::rc::Rc;

use crate::error::MimeError;

/// The capability readers and codecs operate on. A handle is opened either
/// for reading or for writing; `seek`/`tell` are valid on read handles only.
///
/// `getline` returns a raw line including its terminator, which may be any
/// of CR, LF, CRLF or LFCR; a final line may carry no terminator at all.
pub trait MimeIo {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, MimeError>;

    fn getline(&mut self) -> Result<Option<Vec<u8>>, MimeError>;

    fn getlines(&mut self) -> Result<Vec<Vec<u8>>, MimeError> {
        let mut lines = Vec::new();
        while let Some(line) = self.getline()? {
            lines.push(line);
        }
        Ok(lines)
    }

    fn print(&mut self, data: &[u8]) -> Result<(), MimeError>;

    fn close(&mut self) -> Result<(), MimeError>;

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, MimeError>;

    fn tell(&mut self) -> Result<u64, MimeError>;

    /// Drain the remaining stream.
    fn read_to_end(&mut self) -> Result<Vec<u8>, MimeError> {
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = self.read(&mut buf)?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IoMode {
    Read,
    Write,
}

/// In-memory handle over a growable byte buffer. The buffer is shared via
/// `Rc<RefCell<..>>` so a body store can hand out successive read and write
/// views of the same bytes; parsing is single-threaded by contract.
pub struct BufferIo {
    data: Rc<RefCell<Vec<u8>>>,
    pos: usize,
    mode: IoMode,
}

impl BufferIo {
    /// Read handle over an owned byte buffer.
    pub fn reader(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Rc::new(RefCell::new(data.into())),
            pos: 0,
            mode: IoMode::Read,
        }
    }

    /// Write handle over a fresh buffer.
    pub fn writer() -> Self {
        Self {
            data: Rc::new(RefCell::new(Vec::new())),
            pos: 0,
            mode: IoMode::Write,
        }
    }

    pub(crate) fn shared_reader(data: Rc<RefCell<Vec<u8>>>) -> Self {
        Self {
            data,
            pos: 0,
            mode: IoMode::Read,
        }
    }

    /// Write handle over shared storage; truncates prior content.
    pub(crate) fn shared_writer(data: Rc<RefCell<Vec<u8>>>) -> Self {
        data.borrow_mut().clear();
        Self {
            data,
            pos: 0,
            mode: IoMode::Write,
        }
    }

    /// Snapshot of the buffer contents.
    pub fn bytes(&self) -> Vec<u8> {
        self.data.borrow().clone()
    }

    /// Move the buffer contents out, leaving the handle empty.
    pub fn take_bytes(&mut self) -> Vec<u8> {
        self.pos = 0;
        std::mem::take(&mut *self.data.borrow_mut())
    }
}

impl MimeIo for BufferIo {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, MimeError> {
        if self.mode != IoMode::Read {
            return Err(MimeError::misuse("read on a write-opened handle"));
        }
        let data = self.data.borrow();
        let avail = data.len().saturating_sub(self.pos);
        let n = avail.min(buf.len());
        buf[..n].copy_from_slice(&data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn getline(&mut self) -> Result<Option<Vec<u8>>, MimeError> {
        if self.mode != IoMode::Read {
            return Err(MimeError::misuse("getline on a write-opened handle"));
        }
        let data = self.data.borrow();
        if self.pos >= data.len() {
            return Ok(None);
        }
        let end = scan_line_end(&data[self.pos..]) + self.pos;
        let line = data[self.pos..end].to_vec();
        drop(data);
        self.pos = end;
        Ok(Some(line))
    }

    fn print(&mut self, data: &[u8]) -> Result<(), MimeError> {
        if self.mode != IoMode::Write {
            return Err(MimeError::misuse("print on a read-opened handle"));
        }
        self.data.borrow_mut().extend_from_slice(data);
        Ok(())
    }

    fn close(&mut self) -> Result<(), MimeError> {
        Ok(())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, MimeError> {
        if self.mode != IoMode::Read {
            return Err(MimeError::misuse("seek on a write-opened handle"));
        }
        let len = self.data.borrow().len() as i64;
        let target = match pos {
            SeekFrom::Start(n) => n as i64,
            SeekFrom::End(n) => len + n,
            SeekFrom::Current(n) => self.pos as i64 + n,
        };
        // Clamp into [0, len] rather than erroring on overshoot.
        self.pos = target.clamp(0, len) as usize;
        Ok(self.pos as u64)
    }

    fn tell(&mut self) -> Result<u64, MimeError> {
        if self.mode != IoMode::Read {
            return Err(MimeError::misuse("tell on a write-opened handle"));
        }
        Ok(self.pos as u64)
    }
}

/// Find the end offset (inclusive of terminator) of the first line in `data`.
/// Terminators recognized: CRLF, LFCR, CR, LF. A two-byte form is taken
/// greedily; an unterminated tail is one line.
fn scan_line_end(data: &[u8]) -> usize {
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'\n' => {
                if data.get(i + 1) == Some(&b'\r') {
                    return i + 2;
                }
                return i + 1;
            }
            b'\r' => {
                if data.get(i + 1) == Some(&b'\n') {
                    return i + 2;
                }
                return i + 1;
            }
            _ => i += 1,
        }
    }
    data.len()
}

/// Byte-at-a-time source with one byte of pushback; shared line-splitting
/// logic for the file and pipe handles.
trait ByteSource {
    fn next_byte(&mut self) -> Result<Option<u8>, MimeError>;
    fn push_back(&mut self, b: u8);
}

fn read_terminated_line<S: ByteSource>(src: &mut S) -> Result<Option<Vec<u8>>, MimeError> {
    let mut line = Vec::new();
    loop {
        let b = match src.next_byte()? {
            Some(b) => b,
            None => {
                if line.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(line));
            }
        };
        line.push(b);
        if b == b'\n' || b == b'\r' {
            let other = if b == b'\n' { b'\r' } else { b'\n' };
            match src.next_byte()? {
                Some(next) if next == other => line.push(next),
                Some(next) => src.push_back(next),
                None => {}
            }
            return Ok(Some(line));
        }
    }
}

/// Native file handle. Read-opened handles buffer input and support seek;
/// write-opened handles truncate on creation and append thereafter.
pub struct FileIo {
    reader: Option<BufReader<File>>,
    writer: Option<File>,
    pending: Option<u8>,
}

impl FileIo {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MimeError> {
        let f = File::open(path)?;
        Ok(Self {
            reader: Some(BufReader::new(f)),
            writer: None,
            pending: None,
        })
    }

    pub fn create(path: impl AsRef<Path>) -> Result<Self, MimeError> {
        let f = File::create(path)?;
        Ok(Self {
            reader: None,
            writer: Some(f),
            pending: None,
        })
    }
}

impl ByteSource for FileIo {
    fn next_byte(&mut self) -> Result<Option<u8>, MimeError> {
        if let Some(b) = self.pending.take() {
            return Ok(Some(b));
        }
        let r = self
            .reader
            .as_mut()
            .ok_or_else(|| MimeError::misuse("getline on a write-opened handle"))?;
        let mut one = [0u8; 1];
        match r.read(&mut one)? {
            0 => Ok(None),
            _ => Ok(Some(one[0])),
        }
    }

    fn push_back(&mut self, b: u8) {
        self.pending = Some(b);
    }
}

impl MimeIo for FileIo {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, MimeError> {
        let r = self
            .reader
            .as_mut()
            .ok_or_else(|| MimeError::misuse("read on a write-opened handle"))?;
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(b) = self.pending.take() {
            buf[0] = b;
            let n = r.read(&mut buf[1..])?;
            return Ok(n + 1);
        }
        Ok(r.read(buf)?)
    }

    fn getline(&mut self) -> Result<Option<Vec<u8>>, MimeError> {
        if self.reader.is_none() {
            return Err(MimeError::misuse("getline on a write-opened handle"));
        }
        read_terminated_line(self)
    }

    fn print(&mut self, data: &[u8]) -> Result<(), MimeError> {
        let w = self
            .writer
            .as_mut()
            .ok_or_else(|| MimeError::misuse("print on a read-opened handle"))?;
        w.write_all(data)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), MimeError> {
        if let Some(mut w) = self.writer.take() {
            w.flush()?;
        }
        self.reader = None;
        self.pending = None;
        Ok(())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, MimeError> {
        let r = self
            .reader
            .as_mut()
            .ok_or_else(|| MimeError::misuse("seek on a write-opened handle"))?;
        self.pending = None;
        Ok(r.seek(pos)?)
    }

    fn tell(&mut self) -> Result<u64, MimeError> {
        let r = self
            .reader
            .as_mut()
            .ok_or_else(|| MimeError::misuse("tell on a write-opened handle"))?;
        let pos = r.stream_position()?;
        Ok(pos - self.pending.is_some() as u64)
    }
}

/// Handle over an external filter command. A read pipe runs the command
/// with the backing file on its stdin and yields the command's stdout; a
/// write pipe feeds the command's stdin and directs its stdout at the
/// backing file. `close` reaps the child and surfaces a nonzero exit.
pub struct PipeIo {
    child: Option<Child>,
    stdout: Option<BufReader<ChildStdout>>,
    stdin: Option<ChildStdin>,
    pending: Option<u8>,
}

impl PipeIo {
    pub fn filter_reader(command: &[String], path: &Path) -> Result<Self, MimeError> {
        if command.is_empty() {
            return Err(MimeError::misuse("empty filter command"));
        }
        let src = File::open(path)?;
        let mut child = Command::new(&command[0])
            .args(&command[1..])
            .stdin(Stdio::from(src))
            .stdout(Stdio::piped())
            .spawn()?;
        let stdout = child.stdout.take().map(BufReader::new);
        Ok(Self {
            child: Some(child),
            stdout,
            stdin: None,
            pending: None,
        })
    }

    pub fn filter_writer(command: &[String], path: &Path) -> Result<Self, MimeError> {
        if command.is_empty() {
            return Err(MimeError::misuse("empty filter command"));
        }
        let dst = File::create(path)?;
        let mut child = Command::new(&command[0])
            .args(&command[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::from(dst))
            .spawn()?;
        let stdin = child.stdin.take();
        Ok(Self {
            child: Some(child),
            stdout: None,
            stdin,
            pending: None,
        })
    }
}

impl ByteSource for PipeIo {
    fn next_byte(&mut self) -> Result<Option<u8>, MimeError> {
        if let Some(b) = self.pending.take() {
            return Ok(Some(b));
        }
        let r = self
            .stdout
            .as_mut()
            .ok_or_else(|| MimeError::misuse("getline on a write-opened handle"))?;
        let mut one = [0u8; 1];
        match r.read(&mut one)? {
            0 => Ok(None),
            _ => Ok(Some(one[0])),
        }
    }

    fn push_back(&mut self, b: u8) {
        self.pending = Some(b);
    }
}

impl MimeIo for PipeIo {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, MimeError> {
        let r = self
            .stdout
            .as_mut()
            .ok_or_else(|| MimeError::misuse("read on a write-opened handle"))?;
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(b) = self.pending.take() {
            buf[0] = b;
            let n = r.read(&mut buf[1..])?;
            return Ok(n + 1);
        }
        Ok(r.read(buf)?)
    }

    fn getline(&mut self) -> Result<Option<Vec<u8>>, MimeError> {
        if self.stdout.is_none() {
            return Err(MimeError::misuse("getline on a write-opened handle"));
        }
        read_terminated_line(self)
    }

    fn print(&mut self, data: &[u8]) -> Result<(), MimeError> {
        let w = self
            .stdin
            .as_mut()
            .ok_or_else(|| MimeError::misuse("print on a read-opened handle"))?;
        w.write_all(data)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), MimeError> {
        // Drop stdin first so the child sees EOF before we wait.
        self.stdin = None;
        self.stdout = None;
        self.pending = None;
        if let Some(mut child) = self.child.take() {
            let status = child.wait()?;
            if !status.success() {
                return Err(MimeError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("filter command exited with {}", status),
                )));
            }
        }
        Ok(())
    }

    fn seek(&mut self, _pos: SeekFrom) -> Result<u64, MimeError> {
        Err(MimeError::misuse("seek on a filter pipe"))
    }

    fn tell(&mut self) -> Result<u64, MimeError> {
        Err(MimeError::misuse("tell on a filter pipe"))
    }
}

impl Drop for PipeIo {
    fn drop(&mut self) {
        // Reap on every exit path; a failed parse must not leak the child.
        self.stdin = None;
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_getline_mixed_terminators() {
        let mut io = BufferIo::reader(b"a\r\nb\nc\rd\n\re".to_vec());
        assert_eq!(io.getline().unwrap().unwrap(), b"a\r\n");
        assert_eq!(io.getline().unwrap().unwrap(), b"b\n");
        assert_eq!(io.getline().unwrap().unwrap(), b"c\r");
        assert_eq!(io.getline().unwrap().unwrap(), b"d\n\r");
        assert_eq!(io.getline().unwrap().unwrap(), b"e");
        assert!(io.getline().unwrap().is_none());
    }

    #[test]
    fn buffer_seek_clamps() {
        let mut io = BufferIo::reader(b"hello".to_vec());
        assert_eq!(io.seek(SeekFrom::Start(100)).unwrap(), 5);
        assert_eq!(io.seek(SeekFrom::Current(-100)).unwrap(), 0);
        assert_eq!(io.seek(SeekFrom::End(-2)).unwrap(), 3);
        let mut buf = [0u8; 8];
        assert_eq!(io.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(io.tell().unwrap(), 5);
    }

    #[test]
    fn buffer_writer_appends_and_rejects_read() {
        let mut io = BufferIo::writer();
        io.print(b"abc").unwrap();
        io.print(b"def").unwrap();
        assert_eq!(io.bytes(), b"abcdef");
        let mut buf = [0u8; 4];
        assert!(matches!(io.read(&mut buf), Err(MimeError::Misuse(_))));
        assert!(matches!(io.seek(SeekFrom::Start(0)), Err(MimeError::Misuse(_))));
    }

    #[test]
    fn buffer_getlines_collects_all() {
        let mut io = BufferIo::reader(b"one\ntwo\nthree".to_vec());
        let lines = io.getlines().unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], b"three");
    }

    fn temp_path(stem: &str) -> std::path::PathBuf {
        let mut b = [0u8; 8];
        let _ = getrandom::getrandom(&mut b);
        let suffix: String = b.iter().map(|x| format!("{:02x}", x)).collect();
        std::env::temp_dir().join(format!("sbusta-{}-{}", stem, suffix))
    }

    #[test]
    fn file_roundtrip_and_cr_only_lines() {
        let path = temp_path("io");
        let mut w = FileIo::create(&path).unwrap();
        w.print(b"alpha\rbeta\rgamma").unwrap();
        w.close().unwrap();

        let mut r = FileIo::open(&path).unwrap();
        assert_eq!(r.getline().unwrap().unwrap(), b"alpha\r");
        assert_eq!(r.tell().unwrap(), 6);
        assert_eq!(r.getline().unwrap().unwrap(), b"beta\r");
        assert_eq!(r.getline().unwrap().unwrap(), b"gamma");
        assert!(r.getline().unwrap().is_none());
        r.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(r.read_to_end().unwrap(), b"alpha\rbeta\rgamma");
        std::fs::remove_file(&path).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn pipe_reader_passthrough() {
        let path = temp_path("pipe");
        std::fs::write(&path, b"line one\nline two\n").unwrap();
        let cmd = vec!["cat".to_string()];
        let mut p = PipeIo::filter_reader(&cmd, &path).unwrap();
        assert_eq!(p.getline().unwrap().unwrap(), b"line one\n");
        assert_eq!(p.read_to_end().unwrap(), b"line two\n");
        p.close().unwrap();
        std::fs::remove_file(&path).unwrap();
    }
}
