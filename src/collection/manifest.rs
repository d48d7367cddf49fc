//! Collection manifest format
//!
//! A manifest is UTF-8 text, one member per line:
//!
//! ```text
//! ed2k://|file|<name>|<size>|<HEX identity>|/
//! ```
//!
//! `%`, `|` and line breaks in names are percent-encoded.

use crate::error::CollectionError;
use crate::types::ContentId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

/// File extension of collection manifests
pub const COLLECTION_EXTENSION: &str = "emulecollection";

const LINK_PREFIX: &str = "ed2k://|file|";
const LINK_SUFFIX: &str = "|/";

/// One member of a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub size: u64,
    pub identity: ContentId,
}

impl ManifestEntry {
    pub fn to_line(&self) -> String {
        format!(
            "{}{}|{}|{}{}",
            LINK_PREFIX,
            escape_name(&self.name),
            self.size,
            self.identity.to_hex(),
            LINK_SUFFIX
        )
    }

    pub fn parse_line(line: &str) -> Result<Self, String> {
        let body = line
            .trim()
            .strip_prefix(LINK_PREFIX)
            .and_then(|rest| rest.strip_suffix(LINK_SUFFIX))
            .ok_or_else(|| "not a file link".to_string())?;

        let fields: Vec<&str> = body.split('|').collect();
        let [name, size, identity] = fields.as_slice() else {
            return Err(format!("expected 3 fields, found {}", fields.len()));
        };
        if name.is_empty() {
            return Err("empty name".to_string());
        }

        Ok(Self {
            name: unescape_name(name)?,
            size: size
                .parse()
                .map_err(|e| format!("invalid size {:?}: {}", size, e))?,
            identity: identity
                .parse()
                .map_err(|e| format!("invalid identity {:?}: {}", identity, e))?,
        })
    }
}

/// A parsed or to-be-written manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.to_line() + "\n")
            .collect()
    }

    /// Write to `path`, truncating anything already there.
    pub fn write(&self, path: &Path) -> Result<(), CollectionError> {
        let wrap = |source| CollectionError::ManifestWrite {
            path: path.to_path_buf(),
            source,
        };
        let mut file = fs::File::create(path).map_err(wrap)?;
        file.write_all(self.render().as_bytes()).map_err(wrap)?;
        file.sync_all().map_err(wrap)
    }

    pub fn read(path: &Path) -> Result<Self, CollectionError> {
        let content = fs::read_to_string(path).map_err(|source| CollectionError::ManifestRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, CollectionError> {
        let entries = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                ManifestEntry::parse_line(line).map_err(|reason| CollectionError::Malformed {
                    line: index + 1,
                    reason,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }
}

fn escape_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '%' => out.push_str("%25"),
            '|' => out.push_str("%7C"),
            '\n' => out.push_str("%0A"),
            '\r' => out.push_str("%0D"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_name(name: &str) -> Result<String, String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .ok_or_else(|| format!("truncated escape in {:?}", name))?;
            let decoded = hex::decode(hex).map_err(|e| format!("bad escape in {:?}: {}", name, e))?;
            out.extend_from_slice(&decoded);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|e| format!("name is not UTF-8: {}", e))
}
