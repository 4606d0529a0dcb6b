/*
 * parser.rs
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

//! Recursive-descent decomposition of a MIME message into an entity tree.

use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::body::{BodyMode, StoreSpec};
use crate::boundary::{is_valid_token, random_hex, synthesize_token, BoundaryContext, Termination};
use crate::codec::{BinaryCodec, Codec, Registry};
use crate::entity::{Entity, Packaging};
use crate::error::MimeError;
use crate::header::{remove_parameter, MimeHeader};
use crate::io::{BufferIo, FileIo, MimeIo};
use crate::reader::{trim_eol, BoundaryReader};

/// How an embedded `message/*` part appears in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nested {
    /// The message part stays in the tree, holding the inner entity as its
    /// single child.
    Nest,
    /// The inner entity takes the message part's place.
    Replace,
}

/// A successful parse: the entity tree plus every recoverable anomaly
/// observed along the way.
pub struct Parsed {
    pub entity: Entity,
    pub warnings: Vec<String>,
}

/// A failed parse. The subtree built before the failure is retained so
/// callers can salvage what decoded cleanly (and `purge` it).
pub struct ParseFailure {
    pub error: MimeError,
    pub partial: Option<Entity>,
    pub warnings: Vec<String>,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MIME parse failed: {}", self.error)
    }
}

impl fmt::Debug for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseFailure")
            .field("error", &self.error)
            .field("partial", &self.partial.is_some())
            .field("warnings", &self.warnings)
            .finish()
    }
}

impl std::error::Error for ParseFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Storage policy hook: given the declared Content-Length (if any) and the
/// part's header, decide where its decoded body lives.
pub type StorePolicy = Box<dyn Fn(Option<u64>, &MimeHeader) -> StoreSpec>;

/// Declared lengths below this default threshold stay in memory when an
/// output directory is configured.
const DEFAULT_MEMORY_CUTOFF: u64 = 16 * 1024;

const DEFAULT_MAX_DEPTH: usize = 64;

/// The decomposition engine. Configure with the builder-style setters,
/// then call `parse` (or `parse_bytes`/`parse_file`) once per message;
/// a parser is reusable across messages.
pub struct MimeParser {
    registry: Registry,
    nested: Nested,
    parse_nested: bool,
    capture_preamble: bool,
    capture_epilogue: bool,
    output_dir: Option<PathBuf>,
    memory_cutoff: u64,
    store_policy: Option<StorePolicy>,
    terminators: Vec<String>,
    max_depth: usize,
}

impl MimeParser {
    pub fn new() -> Self {
        Self {
            registry: Registry::builtin(),
            nested: Nested::Nest,
            parse_nested: true,
            capture_preamble: false,
            capture_epilogue: false,
            output_dir: None,
            memory_cutoff: DEFAULT_MEMORY_CUTOFF,
            store_policy: None,
            terminators: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Replace the codec registry, e.g. to add a custom encoding.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn nested(mut self, nested: Nested) -> Self {
        self.nested = nested;
        self
    }

    /// When false, `message/*` parts are stored as opaque leaves.
    pub fn parse_nested_messages(mut self, yes: bool) -> Self {
        self.parse_nested = yes;
        self
    }

    pub fn capture_preamble(mut self, yes: bool) -> Self {
        self.capture_preamble = yes;
        self
    }

    pub fn capture_epilogue(mut self, yes: bool) -> Self {
        self.capture_epilogue = yes;
        self
    }

    /// Store large decoded bodies as files under `dir` instead of in
    /// memory. Without this every body is in-memory.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn memory_cutoff(mut self, bytes: u64) -> Self {
        self.memory_cutoff = bytes;
        self
    }

    /// Full control over body placement; overrides `output_dir` and
    /// `memory_cutoff`.
    pub fn store_policy(mut self, policy: StorePolicy) -> Self {
        self.store_policy = Some(policy);
        self
    }

    /// Register a terminator line that ends the message early, e.g. a
    /// mailbox-format separator.
    pub fn terminator(mut self, line: impl Into<String>) -> Self {
        self.terminators.push(line.into());
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn parse(&self, input: &mut dyn MimeIo) -> Result<Parsed, ParseFailure> {
        let mut warnings = Vec::new();
        let mut ctx = BoundaryContext::new();
        for t in &self.terminators {
            ctx.add_terminator(t.clone());
        }
        match self.parse_entity(input, &ctx, Packaging::Top, 0, &mut warnings) {
            Ok(entity) => Ok(Parsed { entity, warnings }),
            Err(failure) => Err(ParseFailure {
                error: failure.error,
                partial: failure.partial,
                warnings,
            }),
        }
    }

    pub fn parse_bytes(&self, data: impl Into<Vec<u8>>) -> Result<Parsed, ParseFailure> {
        let mut input = BufferIo::reader(data.into());
        self.parse(&mut input)
    }

    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<Parsed, ParseFailure> {
        let mut input = match FileIo::open(path.as_ref()) {
            Ok(io) => io,
            Err(error) => {
                return Err(ParseFailure {
                    error,
                    partial: None,
                    warnings: Vec::new(),
                })
            }
        };
        let result = self.parse(&mut input);
        let _ = input.close();
        result
    }

    /// Parse one entity: its header, then a body dispatched on the
    /// effective content type. On failure the subtree built so far rides
    /// along in the `EntityFailure`.
    fn parse_entity(
        &self,
        input: &mut dyn MimeIo,
        ctx: &BoundaryContext,
        packaging: Packaging,
        depth: usize,
        warnings: &mut Vec<String>,
    ) -> Result<Entity, EntityFailure> {
        let (header, early) = match self.read_header(input, ctx) {
            Ok(h) => h,
            Err(error) => {
                return Err(EntityFailure {
                    error,
                    partial: None,
                })
            }
        };
        let mut entity = Entity::new(header, packaging);
        if early.is_some() {
            // The enclosing region ended before the header/body separator;
            // keep the header, the body is empty.
            warnings.push("part ended before the header/body separator".to_string());
            return Ok(entity);
        }
        let ctype = entity.mime_type();
        let result = if ctype.starts_with("multipart/") && depth < self.max_depth {
            self.parse_multipart(input, ctx, &mut entity, depth, warnings)
        } else if ctype.starts_with("message/") && self.parse_nested && depth < self.max_depth {
            match self.parse_entity(input, ctx, Packaging::Part, depth + 1, warnings) {
                Ok(inner) => match self.nested {
                    Nested::Nest => {
                        entity.add_child(inner);
                        Ok(())
                    }
                    Nested::Replace => {
                        // The inner entity takes this one's place, so it
                        // inherits this one's packaging.
                        let mut inner = inner;
                        inner.set_packaging(packaging);
                        return Ok(inner);
                    }
                },
                Err(mut failure) => {
                    if let Some(partial) = failure.partial.take() {
                        entity.add_child(partial);
                    }
                    Err(failure.error)
                }
            }
        } else {
            if ctype.starts_with("multipart/") {
                warnings.push(format!(
                    "nesting deeper than {} levels; storing {} undecomposed",
                    self.max_depth, ctype
                ));
            }
            self.parse_leaf(input, ctx, &mut entity, warnings)
        };
        match result {
            Ok(()) => Ok(entity),
            Err(error) => Err(EntityFailure {
                error,
                partial: Some(entity),
            }),
        }
    }

    /// Read header lines straight off the input, watching for a boundary
    /// that cuts the header short. Returns the termination when the region
    /// ended before the blank separator line.
    fn read_header(
        &self,
        input: &mut dyn MimeIo,
        ctx: &BoundaryContext,
    ) -> Result<(MimeHeader, Option<Termination>), MimeError> {
        let mut header = MimeHeader::new();
        loop {
            let Some(raw) = input.getline()? else {
                ctx.set_last(Termination::Eof);
                return Ok((header, Some(Termination::Eof)));
            };
            let line = trim_eol(&raw);
            if let Some(term) = ctx.classify(line) {
                ctx.set_last(term.clone());
                return Ok((header, Some(term)));
            }
            if line.is_empty() {
                return Ok((header, None));
            }
            header.push_raw_line(line);
        }
    }

    fn parse_multipart(
        &self,
        input: &mut dyn MimeIo,
        ctx: &BoundaryContext,
        entity: &mut Entity,
        depth: usize,
        warnings: &mut Vec<String>,
    ) -> Result<(), MimeError> {
        let token = self.effective_boundary(entity, warnings);
        let ctx2 = ctx.nested(&token);

        // Everything up to the first boundary is preamble.
        let mut pre = BufferIo::writer();
        let mut term = BoundaryReader::new(input, &ctx2).copy_to(&mut pre)?;
        if self.capture_preamble {
            entity.set_preamble(pre.take_bytes());
        }

        loop {
            match term {
                Termination::Delim(ref t) if t.as_str() == token => {
                    match self.parse_entity(input, &ctx2, Packaging::Part, depth + 1, warnings) {
                        Ok(child) => entity.add_child(child),
                        Err(mut failure) => {
                            if let Some(partial) = failure.partial.take() {
                                entity.add_child(partial);
                            }
                            return Err(failure.error);
                        }
                    }
                    // The child consumed up to the next boundary; the
                    // shared cell says which one.
                    term = ctx2.last().unwrap_or(Termination::Eof);
                }
                Termination::Close(ref t) if t.as_str() == token => {
                    // Epilogue runs to the end of the enclosing region; it
                    // is consumed either way so the input lines up on the
                    // parent's next boundary.
                    let mut epi = BufferIo::writer();
                    BoundaryReader::new(input, ctx).copy_to(&mut epi)?;
                    if self.capture_epilogue {
                        entity.set_epilogue(epi.take_bytes());
                    }
                    return Ok(());
                }
                Termination::Delim(_) | Termination::Close(_) => {
                    // An ancestor's boundary: this multipart never closed.
                    // The cell already carries the match up to its owner.
                    warnings.push(format!(
                        "multipart boundary \"{}\" never closed (enclosing boundary reached)",
                        token
                    ));
                    return Ok(());
                }
                Termination::Done(ref lit) => {
                    warnings.push(format!(
                        "multipart boundary \"{}\" never closed (terminator {:?} reached)",
                        token, lit
                    ));
                    return Ok(());
                }
                Termination::Eof => {
                    warnings.push(format!(
                        "multipart boundary \"{}\" never closed (end of input)",
                        token
                    ));
                    return Ok(());
                }
            }
        }
    }

    /// The declared boundary when legal; otherwise a synthesized token,
    /// written back into Content-Type so the tree re-serializes
    /// consistently.
    fn effective_boundary(&self, entity: &mut Entity, warnings: &mut Vec<String>) -> String {
        let declared = entity.header().multipart_boundary();
        if let Some(token) = &declared {
            if is_valid_token(token) {
                return token.clone();
            }
        }
        let token = synthesize_token();
        warnings.push(match &declared {
            Some(bad) => format!("illegal boundary {:?}; substituting \"{}\"", bad, token),
            None => format!("multipart with no boundary; substituting \"{}\"", token),
        });
        let ctype = entity
            .header()
            .get("Content-Type")
            .unwrap_or("multipart/mixed")
            .to_string();
        let mut rewritten = remove_parameter(&ctype, "boundary");
        rewritten.push_str(&format!("; boundary=\"{}\"", token));
        entity.header_mut().replace("Content-Type", rewritten);
        token
    }

    fn parse_leaf(
        &self,
        input: &mut dyn MimeIo,
        ctx: &BoundaryContext,
        entity: &mut Entity,
        warnings: &mut Vec<String>,
    ) -> Result<(), MimeError> {
        let encoding = entity.header().mime_encoding();
        let codec: Rc<dyn Codec> = match self.registry.lookup(&encoding) {
            Some(c) => c,
            None => {
                warnings.push(format!(
                    "unsupported encoding \"{}\"; storing the body undecoded",
                    encoding
                ));
                self.registry
                    .lookup("binary")
                    .unwrap_or_else(|| Rc::new(BinaryCodec))
            }
        };
        let mut body = self.store_spec(entity.header()).create();
        let mut handle = body.open(BodyMode::Write)?;
        let mut region = BoundaryReader::new(input, ctx);
        let decoded = codec.decode(&mut region, handle.as_mut());
        let closed = handle.close();
        if let Err(e) = decoded.and(closed) {
            let _ = body.purge();
            return Err(e);
        }
        entity.set_body(body);
        Ok(())
    }

    fn store_spec(&self, header: &MimeHeader) -> StoreSpec {
        let declared = header.content_length();
        if let Some(policy) = &self.store_policy {
            return policy(declared, header);
        }
        match &self.output_dir {
            None => StoreSpec::Memory,
            Some(dir) => {
                if declared.is_some_and(|n| n < self.memory_cutoff) {
                    StoreSpec::Memory
                } else {
                    StoreSpec::File(dir.join(output_file_name(header)))
                }
            }
        }
    }
}

impl Default for MimeParser {
    fn default() -> Self {
        Self::new()
    }
}

struct EntityFailure {
    error: MimeError,
    partial: Option<Entity>,
}

/// A safe file name for a part: the sanitized recommended filename, or a
/// random one when the part declares none (or an unusable one).
fn output_file_name(header: &MimeHeader) -> String {
    if let Some(name) = header.recommended_filename() {
        let safe: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let safe = safe.trim_start_matches('.');
        if !safe.is_empty() && safe.len() <= 255 {
            return safe.to_string();
        }
    }
    format!("part-{}.bin", random_hex(12))
}
