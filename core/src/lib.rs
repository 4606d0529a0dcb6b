/*
 * lib.rs
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

//! Streaming MIME decomposition (RFC 2045/2046): a boundary-aware reader,
//! pluggable transfer-encoding codecs, pluggable body storage, and a
//! recursive-descent parser producing an entity tree.

pub mod body;
pub mod boundary;
pub mod codec;
pub mod entity;
pub mod error;
pub mod header;
pub mod io;
pub mod parser;
pub mod reader;

pub use body::{Body, BodyMode, FileBody, ScalarBody, StoreSpec};
pub use boundary::{is_valid_token, synthesize_token, BoundaryContext, Termination};
pub use codec::{Codec, Registry};
pub use entity::{Entity, Packaging};
pub use error::MimeError;
pub use header::MimeHeader;
pub use io::{BufferIo, FileIo, MimeIo, PipeIo};
pub use parser::{MimeParser, Nested, ParseFailure, Parsed, StorePolicy};
pub use reader::{trim_eol, BoundaryReader};
