//! `entity2vec` / `relation2vec` codecs

use std::io::Write;
use std::path::Path;

use crate::embedding::EmbeddingTable;
use crate::error::{Error, Result};
use crate::utils::atomic_write_with;

use super::tokens::{LineReader, LineTokens};

/// Decimal places written per vector component
pub const VECTOR_PRECISION: usize = 6;

/// Write one tab-separated row per id
pub fn write_vectors(path: &Path, table: &EmbeddingTable) -> Result<()> {
    atomic_write_with(path, |file| {
        for row in table.rows() {
            for (i, value) in row.iter().enumerate() {
                if i > 0 {
                    file.write_all(b"\t")?;
                }
                write!(file, "{:.*}", VECTOR_PRECISION, value)?;
            }
            writeln!(file)?;
        }
        Ok(())
    })
}

/// Read a vector file, requiring exactly `expected_rows` rows of equal width
pub fn read_vectors(path: &Path, expected_rows: usize) -> Result<EmbeddingTable> {
    let mut reader = LineReader::open(path)?;
    let mut values = Vec::new();
    let mut dim = None;
    let mut rows = 0usize;

    while let Some((line_no, line)) = reader.next_line()? {
        let mut tokens = LineTokens::new(path, line_no, &line);
        let mut width = 0usize;
        while let Ok(value) = tokens.next_str("component") {
            let value: f32 = value.parse().map_err(|_| {
                Error::parse(path, line_no, format!("invalid component '{}'", value))
            })?;
            if !value.is_finite() {
                return Err(Error::parse(path, line_no, "non-finite component"));
            }
            values.push(value);
            width += 1;
        }

        match dim {
            None if width == 0 => return Err(Error::parse(path, line_no, "empty vector")),
            None => dim = Some(width),
            Some(expected) if expected != width => {
                return Err(Error::parse(
                    path,
                    line_no,
                    format!("expected {} components, found {}", expected, width),
                ))
            }
            Some(_) => {}
        }
        rows += 1;
    }

    if rows != expected_rows {
        return Err(Error::parse(
            path,
            rows,
            format!("expected {} vectors, found {}", expected_rows, rows),
        ));
    }

    EmbeddingTable::from_flat(dim.unwrap_or(1), values)
}
