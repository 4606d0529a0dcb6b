/*
 * entity.rs
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

//! The decomposed entity tree: headers, decoded bodies, child parts.

use crate::body::{Body, BodyMode};
use crate::codec::{BinaryCodec, Codec, Registry};
use crate::error::MimeError;
use crate::header::MimeHeader;
use crate::io::{BufferIo, MimeIo};

use std::rc::Rc;

/// How an entity is packaged within the overall message. Preamble and
/// epilogue material never becomes an entity; it is carried as raw bytes
/// on the owning multipart node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packaging {
    /// The root of the parse.
    Top,
    /// A part delimited by multipart boundaries.
    Part,
}

/// One node of the decomposition tree. A leaf owns decoded body storage;
/// a composite (multipart, or a nested message under `Nested::Nest`) owns
/// child entities instead. Multipart entities may additionally carry the
/// raw preamble and epilogue bytes when capture was requested.
pub struct Entity {
    header: MimeHeader,
    packaging: Packaging,
    body: Option<Box<dyn Body>>,
    children: Vec<Entity>,
    preamble: Option<Vec<u8>>,
    epilogue: Option<Vec<u8>>,
}

impl Entity {
    pub fn new(header: MimeHeader, packaging: Packaging) -> Self {
        Self {
            header,
            packaging,
            body: None,
            children: Vec::new(),
            preamble: None,
            epilogue: None,
        }
    }

    pub fn header(&self) -> &MimeHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut MimeHeader {
        &mut self.header
    }

    pub fn packaging(&self) -> Packaging {
        self.packaging
    }

    pub fn set_packaging(&mut self, packaging: Packaging) {
        self.packaging = packaging;
    }

    pub fn mime_type(&self) -> String {
        self.header.mime_type()
    }

    pub fn is_multipart(&self) -> bool {
        self.mime_type().starts_with("multipart/")
    }

    pub fn body(&self) -> Option<&dyn Body> {
        self.body.as_deref()
    }

    pub fn body_mut(&mut self) -> Option<&mut (dyn Body + 'static)> {
        self.body.as_deref_mut()
    }

    pub fn set_body(&mut self, body: Box<dyn Body>) {
        self.body = Some(body);
    }

    pub fn take_body(&mut self) -> Option<Box<dyn Body>> {
        self.body.take()
    }

    pub fn children(&self) -> &[Entity] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Entity> {
        &mut self.children
    }

    pub fn add_child(&mut self, child: Entity) {
        self.children.push(child);
    }

    pub fn preamble(&self) -> Option<&[u8]> {
        self.preamble.as_deref()
    }

    pub fn set_preamble(&mut self, bytes: Vec<u8>) {
        self.preamble = Some(bytes);
    }

    pub fn epilogue(&self) -> Option<&[u8]> {
        self.epilogue.as_deref()
    }

    pub fn set_epilogue(&mut self, bytes: Vec<u8>) {
        self.epilogue = Some(bytes);
    }

    /// The full decoded body as bytes. Misuse on a composite entity.
    pub fn decoded_bytes(&self) -> Result<Vec<u8>, MimeError> {
        let Some(body) = self.body.as_deref() else {
            return Err(MimeError::misuse("entity has no body storage"));
        };
        let mut io = body.open(BodyMode::Read)?;
        let data = io.read_to_end()?;
        io.close()?;
        Ok(data)
    }

    /// Release body storage for this entity and every descendant. Errors
    /// from individual stores do not stop the sweep; the first is returned.
    pub fn purge(&mut self) -> Result<(), MimeError> {
        let mut first_err = None;
        if let Some(body) = self.body.as_deref_mut() {
            if let Err(e) = body.purge() {
                first_err.get_or_insert(e);
            }
        }
        for child in &mut self.children {
            if let Err(e) = child.purge() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Re-serialize the entity: headers, then the body re-encoded with its
    /// declared transfer-encoding (binary when the registry has no codec
    /// for it), or boundary-framed children for a composite.
    pub fn write_to(&self, out: &mut dyn MimeIo, registry: &Registry) -> Result<(), MimeError> {
        self.header.write_to(out)?;
        if self.is_multipart() {
            return self.write_parts(out, registry);
        }
        if !self.children.is_empty() {
            // A nested message holds exactly one child, written inline.
            for child in &self.children {
                child.write_to(out, registry)?;
            }
            return Ok(());
        }
        if let Some(body) = self.body.as_deref() {
            let codec = self.write_codec(registry);
            let mut input = body.open(BodyMode::Read)?;
            let result = codec.encode(input.as_mut(), out);
            input.close()?;
            result?;
        }
        Ok(())
    }

    fn write_codec(&self, registry: &Registry) -> Rc<dyn Codec> {
        registry
            .lookup(&self.header.mime_encoding())
            .unwrap_or_else(|| Rc::new(BinaryCodec))
    }

    fn write_parts(&self, out: &mut dyn MimeIo, registry: &Registry) -> Result<(), MimeError> {
        let Some(token) = self.header.multipart_boundary() else {
            return Err(MimeError::misuse("multipart entity without a boundary"));
        };
        if let Some(p) = self.preamble.as_deref() {
            if !p.is_empty() {
                out.print(p)?;
                out.print(b"\n")?;
            }
        }
        for child in &self.children {
            out.print(b"--")?;
            out.print(token.as_bytes())?;
            out.print(b"\n")?;
            // Buffer the part so a missing final newline can be restored
            // as the EOL the boundary strips on the next parse.
            let mut buf = BufferIo::writer();
            child.write_to(&mut buf, registry)?;
            let mut bytes = buf.take_bytes();
            if bytes.last() != Some(&b'\n') {
                bytes.push(b'\n');
            }
            out.print(&bytes)?;
        }
        out.print(b"--")?;
        out.print(token.as_bytes())?;
        out.print(b"--\n")?;
        if let Some(e) = self.epilogue.as_deref() {
            if !e.is_empty() {
                out.print(e)?;
                if e.last() != Some(&b'\n') {
                    out.print(b"\n")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::ScalarBody;

    fn leaf(ctype: &str, encoding: &str, body: &[u8]) -> Entity {
        let mut h = MimeHeader::new();
        h.add("Content-Type", ctype);
        h.add("Content-Transfer-Encoding", encoding);
        let mut e = Entity::new(h, Packaging::Part);
        e.set_body(Box::new(ScalarBody::from_bytes(body.to_vec())));
        e
    }

    #[test]
    fn decoded_bytes_reads_body_storage() {
        let e = leaf("text/plain", "7bit", b"hello\n");
        assert_eq!(e.decoded_bytes().unwrap(), b"hello\n");
        assert_eq!(e.mime_type(), "text/plain");
        assert!(!e.is_multipart());
    }

    #[test]
    fn decoded_bytes_on_composite_is_misuse() {
        let mut h = MimeHeader::new();
        h.add("Content-Type", "multipart/mixed; boundary=b");
        let e = Entity::new(h, Packaging::Top);
        assert!(matches!(e.decoded_bytes(), Err(MimeError::Misuse(_))));
    }

    #[test]
    fn write_leaf_reencodes_with_declared_encoding() {
        let e = leaf("text/plain", "quoted-printable", b"caf\xC3\xA9\n");
        let mut out = BufferIo::writer();
        e.write_to(&mut out, &Registry::builtin()).unwrap();
        assert_eq!(
            out.bytes(),
            b"Content-Type: text/plain\nContent-Transfer-Encoding: quoted-printable\n\ncaf=C3=A9\n"
        );
    }

    #[test]
    fn write_leaf_unknown_encoding_falls_back_to_binary() {
        let e = leaf("text/plain", "x-mystery", b"raw bytes");
        let mut out = BufferIo::writer();
        e.write_to(&mut out, &Registry::builtin()).unwrap();
        assert!(out.bytes().ends_with(b"\n\nraw bytes"));
    }

    #[test]
    fn write_multipart_frames_children() {
        let mut h = MimeHeader::new();
        h.add("Content-Type", "multipart/mixed; boundary=\"unit-42\"");
        let mut e = Entity::new(h, Packaging::Top);
        e.add_child(leaf("text/plain", "7bit", b"first part\n"));
        e.add_child(leaf("text/plain", "7bit", b"second part"));
        e.set_preamble(b"This is a MIME message.".to_vec());
        e.set_epilogue(b"goodbye\n".to_vec());
        let mut out = BufferIo::writer();
        e.write_to(&mut out, &Registry::builtin()).unwrap();
        let expected: &[u8] = b"Content-Type: multipart/mixed; boundary=\"unit-42\"\n\n\
            This is a MIME message.\n\
            --unit-42\n\
            Content-Type: text/plain\nContent-Transfer-Encoding: 7bit\n\n\
            first part\n\
            --unit-42\n\
            Content-Type: text/plain\nContent-Transfer-Encoding: 7bit\n\n\
            second part\n\
            --unit-42--\n\
            goodbye\n";
        assert_eq!(out.bytes(), expected);
    }

    #[test]
    fn write_multipart_without_boundary_is_misuse() {
        let mut h = MimeHeader::new();
        h.add("Content-Type", "multipart/mixed");
        let e = Entity::new(h, Packaging::Top);
        let mut out = BufferIo::writer();
        assert!(matches!(
            e.write_to(&mut out, &Registry::builtin()),
            Err(MimeError::Misuse(_))
        ));
    }

    #[test]
    fn purge_sweeps_descendants() {
        let mut h = MimeHeader::new();
        h.add("Content-Type", "multipart/mixed; boundary=b");
        let mut e = Entity::new(h, Packaging::Top);
        e.add_child(leaf("text/plain", "7bit", b"one"));
        e.add_child(leaf("text/plain", "7bit", b"two"));
        e.purge().unwrap();
        for child in e.children() {
            assert!(child.body().unwrap().is_empty().unwrap());
        }
    }
}
