//! Data-model schema parsing.
//!
//! Extracts `model` blocks and their fields from a Prisma-style schema:
//!
//! ```text
//! model Booking {
//!   id      String  @id
//!   Club    Club    @relation(fields: [clubId], references: [id])
//!   Payment Payment[]
//!   @@index([clubId])
//! }
//! ```
//!
//! Only field names, types and modifiers are read; attributes are ignored.
//! A field is a relation when its base type names a `model` or `view`
//! declared in the same schema. Scalars, enums, composite types and types
//! the schema never declares are not relations.

use log::{debug, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to read schema file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No models found in schema file {0}")]
    NoModels(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Multiplicity {
    Single,
    Collection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    /// Name exactly as declared.
    pub name: String,
    /// Target model for relation fields, `None` for scalars.
    pub target_type: Option<String>,
    pub multiplicity: Multiplicity,
    pub optional: bool,
}

impl Field {
    pub fn is_relation(&self) -> bool {
        self.target_type.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Model {
    pub name: String,
    pub fields: Vec<Field>,
}

impl Model {
    pub fn relations(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_relation())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Schema {
    pub models: Vec<Model>,
    pub enums: Vec<String>,
    /// Composite `type` blocks.
    pub types: Vec<String>,
}

impl Schema {
    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn model_names(&self) -> BTreeSet<&str> {
        self.models.iter().map(|m| m.name.as_str()).collect()
    }
}

/// Read and parse a schema file. A file without any model is a setup error.
pub fn parse_schema_file(path: &Path) -> Result<Schema, SchemaError> {
    let source = std::fs::read_to_string(path).map_err(|source| SchemaError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let schema = parse_schema(&source);
    if schema.models.is_empty() {
        return Err(SchemaError::NoModels(path.to_path_buf()));
    }
    debug!(
        "Parsed {} models and {} enums from {}",
        schema.models.len(),
        schema.enums.len(),
        path.display()
    );
    Ok(schema)
}

/// Parse schema text. Malformed field lines and unknown blocks are skipped.
pub fn parse_schema(source: &str) -> Schema {
    let blocks = scan_blocks(source);

    let models: BTreeSet<&str> = blocks
        .iter()
        .filter(|b| matches!(b.keyword, "model" | "view"))
        .map(|b| b.name)
        .collect();

    let mut schema = Schema::default();
    for block in &blocks {
        match block.keyword {
            "model" | "view" => schema.models.push(Model {
                name: block.name.to_string(),
                fields: parse_fields(block.body, &models),
            }),
            "enum" => schema.enums.push(block.name.to_string()),
            "type" => schema.types.push(block.name.to_string()),
            _ => {}
        }
    }
    schema
}

fn parse_fields(body: &str, models: &BTreeSet<&str>) -> Vec<Field> {
    body.lines()
        .filter_map(|line| parse_field(line, models))
        .collect()
}

fn parse_field(line: &str, models: &BTreeSet<&str>) -> Option<Field> {
    let line = line.trim();
    if line.is_empty() || line.starts_with("//") || line.starts_with("@@") {
        return None;
    }

    let mut parts = line.split_whitespace();
    let name = parts.next()?;
    let raw_type = parts.next()?;

    let optional = raw_type.ends_with('?');
    let collection = raw_type.trim_end_matches('?').ends_with("[]");
    // `Unsupported("geometry")?` has base type `Unsupported`
    let base = raw_type
        .split('(')
        .next()
        .unwrap_or(raw_type)
        .trim_end_matches('?')
        .trim_end_matches("[]")
        .trim_end_matches('?');

    let target_type = models.contains(base).then(|| base.to_string());

    Some(Field {
        name: name.to_string(),
        target_type,
        multiplicity: if collection {
            Multiplicity::Collection
        } else {
            Multiplicity::Single
        },
        optional,
    })
}

/// A top-level `keyword Name { ... }` block.
#[derive(Debug)]
struct RawBlock<'a> {
    keyword: &'a str,
    name: &'a str,
    body: &'a str,
}

fn scan_blocks(source: &str) -> Vec<RawBlock<'_>> {
    let bytes = source.as_bytes();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => i = skip_string(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = skip_line(bytes, i),
            b'{' => {
                let line_start = source[..i].rfind('\n').map_or(0, |p| p + 1);
                let mut header = source[line_start..i].split_whitespace();
                let keyword = header.next();
                let name = header.next();
                let extra = header.next();

                let end = find_block_end(bytes, i);
                let body_end = end.unwrap_or(bytes.len());

                match (keyword, name, extra) {
                    (Some(keyword), Some(name), None) => {
                        if end.is_none() {
                            warn!("Unterminated `{keyword} {name}` block in schema");
                        }
                        blocks.push(RawBlock {
                            keyword,
                            name,
                            body: &source[i + 1..body_end],
                        });
                    }
                    _ => debug!("Skipping schema block with header {:?}", &source[line_start..i]),
                }

                i = body_end + 1;
            }
            _ => i += 1,
        }
    }

    blocks
}

/// Index of the `}` closing the brace at `open`. Braces inside string
/// literals and `//` comments are not counted.
fn find_block_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = skip_line(bytes, i);
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Position after the string starting at `start`. Strings end at the closing
/// quote or at the end of the line.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            b'\n' => return i,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn skip_line(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |p| start + p)
}
