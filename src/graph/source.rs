//! Producers of raw triples

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::io::{parse_raw_triple, LineReader};
use crate::types::RawTriple;

/// Anything that can stream `(head, tail, relation)` string triples
///
/// Relation extraction lives outside this crate; it only has to hand its
/// output over through this trait.
pub trait TripleSource {
    /// Label used in logs
    fn name(&self) -> &str;

    /// Call `visit` once per triple, in source order
    fn for_each_triple(&self, visit: &mut dyn FnMut(RawTriple)) -> Result<()>;
}

/// Triples held in memory
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    name: String,
    triples: Vec<RawTriple>,
}

impl VecSource {
    pub fn new(name: impl Into<String>, triples: Vec<RawTriple>) -> Self {
        Self {
            name: name.into(),
            triples,
        }
    }
}

impl TripleSource for VecSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn for_each_triple(&self, visit: &mut dyn FnMut(RawTriple)) -> Result<()> {
        for triple in &self.triples {
            visit(triple.clone());
        }
        Ok(())
    }
}

/// `<head> <tail> <relation>` lines, tab or whitespace separated
#[derive(Debug, Clone)]
pub struct TsvSource {
    path: PathBuf,
    name: String,
}

impl TsvSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path.display().to_string();
        Self { path, name }
    }
}

impl TripleSource for TsvSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn for_each_triple(&self, visit: &mut dyn FnMut(RawTriple)) -> Result<()> {
        let mut reader = LineReader::open(&self.path)?;
        while let Some((line_no, line)) = reader.next_line()? {
            visit(parse_raw_triple(&self.path, line_no, &line)?);
        }
        Ok(())
    }
}
