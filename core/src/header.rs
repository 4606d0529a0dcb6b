/*
 * header.rs
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

//! Entity headers: ordered raw fields, unfolding, RFC 2047 encoded-words,
//! and the derived MIME attributes the decomposition core reads.

use crate::codec::{base64_decode_slice, decode_q_slice};
use crate::error::MimeError;
use crate::io::MimeIo;
use crate::reader::trim_eol;

/// Ordered, insertion-order-preserving collection of header fields.
/// Values are kept raw (unfolded but otherwise untouched); RFC 2047
/// decoding happens on demand via `decoded`.
#[derive(Debug, Clone, Default)]
pub struct MimeHeader {
    fields: Vec<(String, String)>,
}

impl MimeHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a header block: lines up to and including the first empty line
    /// (or EOF). Folded continuation lines are joined with a single space.
    /// Lines without a colon are tolerated and skipped.
    pub fn read_from(input: &mut dyn MimeIo) -> Result<Self, MimeError> {
        let mut header = Self::new();
        while let Some(raw) = input.getline()? {
            let line = trim_eol(&raw);
            if line.is_empty() {
                break;
            }
            header.push_raw_line(line);
        }
        Ok(header)
    }

    /// Absorb one terminator-stripped, non-empty header line: a folded
    /// continuation extends the previous field, anything without a colon
    /// is skipped.
    pub fn push_raw_line(&mut self, line: &[u8]) {
        if line.is_empty() {
            return;
        }
        if line[0] == b' ' || line[0] == b'\t' {
            if let Some((_, value)) = self.fields.last_mut() {
                value.push(' ');
                value.push_str(String::from_utf8_lossy(line).trim());
            }
            return;
        }
        let Some(colon) = line.iter().position(|&b| b == b':') else {
            return;
        };
        if colon == 0 {
            return;
        }
        let name = String::from_utf8_lossy(&line[..colon]).trim().to_string();
        let value = String::from_utf8_lossy(&line[colon + 1..]).trim().to_string();
        self.fields.push((name, value));
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// First occurrence, case-insensitive.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Replace the first occurrence in place (or append if absent) and drop
    /// any further occurrences.
    pub fn replace(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        let mut replaced = false;
        self.fields.retain_mut(|(n, v)| {
            if n.eq_ignore_ascii_case(name) {
                if replaced {
                    return false;
                }
                *v = value.clone();
                replaced = true;
            }
            true
        });
        if !replaced {
            self.fields.push((name.to_string(), value));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// First occurrence with RFC 2047 encoded-words expanded.
    pub fn decoded(&self, name: &str) -> Option<String> {
        self.get(name).map(decode_encoded_words)
    }

    /// Serialize the fields followed by the blank separator line, LF-terminated.
    pub fn write_to(&self, out: &mut dyn MimeIo) -> Result<(), MimeError> {
        for (name, value) in &self.fields {
            out.print(name.as_bytes())?;
            out.print(b": ")?;
            out.print(value.as_bytes())?;
            out.print(b"\n")?;
        }
        out.print(b"\n")
    }

    // --- derived MIME attributes ---

    /// Lowercase `type/subtype`; `text/plain` when absent or unparseable
    /// (RFC 2045 section 5.2).
    pub fn mime_type(&self) -> String {
        let Some(value) = self.get("Content-Type") else {
            return "text/plain".to_string();
        };
        let main = value.split(';').next().unwrap_or("").trim();
        if main.split('/').count() == 2 && !main.starts_with('/') && !main.ends_with('/') {
            main.to_ascii_lowercase()
        } else {
            "text/plain".to_string()
        }
    }

    /// Lowercase transfer-encoding name; `7bit` when absent (RFC 2045
    /// section 6.1).
    pub fn mime_encoding(&self) -> String {
        self.get("Content-Transfer-Encoding")
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "7bit".to_string())
    }

    /// The declared multipart boundary parameter, verbatim.
    pub fn multipart_boundary(&self) -> Option<String> {
        self.get("Content-Type").and_then(|v| get_parameter(v, "boundary"))
    }

    /// Filename from Content-Disposition, falling back to the Content-Type
    /// `name` parameter, with encoded-words expanded.
    pub fn recommended_filename(&self) -> Option<String> {
        let raw = self
            .get("Content-Disposition")
            .and_then(|v| get_parameter(v, "filename"))
            .or_else(|| self.get("Content-Type").and_then(|v| get_parameter(v, "name")))?;
        let decoded = decode_encoded_words(&raw);
        if decoded.is_empty() {
            None
        } else {
            Some(decoded)
        }
    }

    pub fn content_length(&self) -> Option<u64> {
        self.get("Content-Length").and_then(|v| v.trim().parse().ok())
    }
}

/// Walk the `;`-separated parameters of a structured header value,
/// honoring quoted values with backslash escapes. Yields (name, decoded
/// value, raw `name=value` text) per parameter; scanning stops at the
/// first segment with no `=`.
fn parameter_segments(value: &str) -> Vec<(&str, String, &str)> {
    let mut out = Vec::new();
    let Some((_, after_main)) = value.split_once(';') else {
        return out;
    };
    let mut rest = after_main;
    loop {
        let trimmed = rest.trim_start_matches(|c: char| c == ';' || c.is_ascii_whitespace());
        if trimmed.is_empty() {
            return out;
        }
        let Some(eq) = trimmed.find('=') else {
            return out;
        };
        let pname = trimmed[..eq].trim();
        let after = &trimmed[eq + 1..];
        let (pvalue, consumed) = if let Some(stripped) = after.strip_prefix('"') {
            let mut v = String::new();
            let mut chars = stripped.char_indices();
            let mut end = stripped.len();
            while let Some((i, c)) = chars.next() {
                match c {
                    '\\' => {
                        if let Some((_, esc)) = chars.next() {
                            v.push(esc);
                        }
                    }
                    '"' => {
                        end = i + 1;
                        break;
                    }
                    _ => v.push(c),
                }
            }
            (v, eq + 2 + end.min(stripped.len()))
        } else {
            let end = after.find(';').unwrap_or(after.len());
            (after[..end].trim().to_string(), eq + 1 + end)
        };
        out.push((pname, pvalue, trimmed[..consumed].trim_end()));
        rest = &trimmed[consumed..];
    }
}

/// Extract a semicolon-separated parameter by name (case-insensitive),
/// honoring quoted values with backslash escapes.
pub fn get_parameter(value: &str, name: &str) -> Option<String> {
    parameter_segments(value)
        .into_iter()
        .find(|(n, _, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v, _)| v)
}

/// Drop every occurrence of one parameter (case-insensitive) from a
/// structured header value, keeping the others verbatim.
pub fn remove_parameter(value: &str, name: &str) -> String {
    let main = value.split(';').next().unwrap_or(value).trim_end();
    let mut out = main.to_string();
    for (n, _, raw) in parameter_segments(value) {
        if !n.eq_ignore_ascii_case(name) {
            out.push_str("; ");
            out.push_str(raw);
        }
    }
    out
}

/// Expand RFC 2047 encoded-words (`=?charset?b|q?payload?=`). Unknown
/// charsets are decoded as Latin-1; adjacent literal text is preserved.
pub fn decode_encoded_words(s: &str) -> String {
    let mut out = String::new();
    let mut rest = s;
    while let Some(start) = rest.find("=?") {
        match parse_encoded_word(&rest[start..]) {
            Some((decoded, consumed)) => {
                out.push_str(&rest[..start]);
                out.push_str(&decoded);
                rest = &rest[start + consumed..];
            }
            None => {
                out.push_str(&rest[..start + 2]);
                rest = &rest[start + 2..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parse one encoded-word at the start of `s`; returns (decoded, length).
fn parse_encoded_word(s: &str) -> Option<(String, usize)> {
    let body = s.strip_prefix("=?")?;
    let q1 = body.find('?')?;
    let charset = &body[..q1];
    let after = &body[q1 + 1..];
    let encoding = after.chars().next()?.to_ascii_lowercase();
    let after = after.get(1..)?.strip_prefix('?')?;
    let end = after.find("?=")?;
    let payload = &after[..end];
    let bytes = match encoding {
        'b' => base64_decode_slice(payload.as_bytes()),
        'q' => decode_q_slice(payload.as_bytes()),
        _ => return None,
    };
    let decoded = charset_to_string(&bytes, charset);
    // "=?" + charset + "?x?" + payload + "?="
    let consumed = 2 + q1 + 3 + end + 2;
    Some((decoded, consumed))
}

fn charset_to_string(bytes: &[u8], charset: &str) -> String {
    let cs = charset
        .split('*') // strip RFC 2231 language tag
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    match cs.as_str() {
        "utf-8" | "utf8" | "us-ascii" | "ascii" => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => String::from_utf8_lossy(bytes).into_owned(),
        },
        // Latin-1 maps bytes to the first 256 code points; also the
        // least-bad fallback for unknown charsets.
        _ => bytes.iter().map(|&b| b as char).collect(),
    }
}
