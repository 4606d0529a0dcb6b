/*
 * body.rs
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

//! Pluggable body storage: where a decoded body's bytes live.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::MimeError;
use crate::io::{BufferIo, FileIo, MimeIo, PipeIo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    Read,
    Write,
}

/// Backing storage for one entity's decoded body. Opened for writing
/// exactly once (truncating), then read any number of times. `purge`
/// releases the backing storage; for file stores that unlinks the file.
pub trait Body {
    fn open(&self, mode: BodyMode) -> Result<Box<dyn MimeIo>, MimeError>;

    /// Nominal backing path for file stores, `None` for in-memory stores.
    /// Reported even when a filter command is interposed on open; used for
    /// cleanup and introspection only.
    fn path(&self) -> Option<&Path>;

    fn purge(&mut self) -> Result<(), MimeError>;

    fn len(&self) -> Result<u64, MimeError>;

    fn is_empty(&self) -> Result<bool, MimeError> {
        Ok(self.len()? == 0)
    }
}

/// In-memory body over a growable buffer shared with its open handles.
pub struct ScalarBody {
    data: Rc<RefCell<Vec<u8>>>,
}

impl ScalarBody {
    pub fn new() -> Self {
        Self {
            data: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Rc::new(RefCell::new(data.into())),
        }
    }
}

impl Default for ScalarBody {
    fn default() -> Self {
        Self::new()
    }
}

impl Body for ScalarBody {
    fn open(&self, mode: BodyMode) -> Result<Box<dyn MimeIo>, MimeError> {
        match mode {
            BodyMode::Read => Ok(Box::new(BufferIo::shared_reader(self.data.clone()))),
            BodyMode::Write => Ok(Box::new(BufferIo::shared_writer(self.data.clone()))),
        }
    }

    fn path(&self) -> Option<&Path> {
        None
    }

    fn purge(&mut self) -> Result<(), MimeError> {
        self.data.borrow_mut().clear();
        Ok(())
    }

    fn len(&self) -> Result<u64, MimeError> {
        Ok(self.data.borrow().len() as u64)
    }
}

/// File-backed body. Optional reader/writer filter commands are spawned on
/// open with the backing file redirected to the child's std streams, so a
/// compressed on-disk form stays transparent to codecs; `path()` keeps
/// reporting the nominal path either way.
pub struct FileBody {
    path: PathBuf,
    reader_filter: Option<Vec<String>>,
    writer_filter: Option<Vec<String>>,
}

impl FileBody {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reader_filter: None,
            writer_filter: None,
        }
    }

    /// Interpose filter commands, e.g. `["gzip", "-dc"]` reading and
    /// `["gzip", "-c"]` writing for transparent on-disk compression.
    pub fn with_filters(mut self, reader: Vec<String>, writer: Vec<String>) -> Self {
        self.reader_filter = Some(reader);
        self.writer_filter = Some(writer);
        self
    }
}

impl Body for FileBody {
    fn open(&self, mode: BodyMode) -> Result<Box<dyn MimeIo>, MimeError> {
        match mode {
            BodyMode::Read => match &self.reader_filter {
                Some(cmd) => Ok(Box::new(PipeIo::filter_reader(cmd, &self.path)?)),
                None => Ok(Box::new(FileIo::open(&self.path)?)),
            },
            BodyMode::Write => match &self.writer_filter {
                Some(cmd) => Ok(Box::new(PipeIo::filter_writer(cmd, &self.path)?)),
                None => Ok(Box::new(FileIo::create(&self.path)?)),
            },
        }
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn purge(&mut self) -> Result<(), MimeError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn len(&self) -> Result<u64, MimeError> {
        Ok(std::fs::metadata(&self.path)?.len())
    }
}

/// Allocation request produced by the storage policy hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSpec {
    Memory,
    File(PathBuf),
    FilteredFile {
        path: PathBuf,
        reader: Vec<String>,
        writer: Vec<String>,
    },
}

impl StoreSpec {
    pub fn create(self) -> Box<dyn Body> {
        match self {
            StoreSpec::Memory => Box::new(ScalarBody::new()),
            StoreSpec::File(path) => Box::new(FileBody::new(path)),
            StoreSpec::FilteredFile {
                path,
                reader,
                writer,
            } => Box::new(FileBody::new(path).with_filters(reader, writer)),
        }
    }
}
