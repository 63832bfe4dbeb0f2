//! `entity2id` / `relation2id` tables and raw triple files

use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::RawTriple;
use crate::utils::atomic_write_with;

use super::tokens::LineReader;

/// Write `<key>\t<id>` lines
pub fn write_id_table<'a, I>(path: &Path, rows: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, usize)>,
{
    atomic_write_with(path, |file| {
        for (key, id) in rows {
            writeln!(file, "{}\t{}", key, id)?;
        }
        Ok(())
    })
}

/// Read `<key>\t<id>` lines
///
/// Keys may contain spaces when the file is tab separated; otherwise the last
/// whitespace token is the id.
pub fn read_id_table(path: &Path) -> Result<Vec<(String, usize)>> {
    let mut reader = LineReader::open(path)?;
    let mut rows = Vec::new();

    while let Some((line_no, line)) = reader.next_line()? {
        let line = line.trim_end();
        let (key, id) = line
            .rsplit_once('\t')
            .or_else(|| line.rsplit_once(char::is_whitespace))
            .ok_or_else(|| Error::parse(path, line_no, "expected '<key> <id>'"))?;

        let key = key.trim();
        if key.is_empty() {
            return Err(Error::parse(path, line_no, "empty key"));
        }
        let id = id
            .trim()
            .parse()
            .map_err(|_| Error::parse(path, line_no, format!("invalid id '{}'", id.trim())))?;
        rows.push((key.to_string(), id));
    }

    Ok(rows)
}

/// Write `<head>\t<tail>\t<relation>` lines
pub fn write_raw_triples(path: &Path, triples: &[RawTriple]) -> Result<()> {
    atomic_write_with(path, |file| {
        for triple in triples {
            writeln!(file, "{}\t{}\t{}", triple.head, triple.tail, triple.relation)?;
        }
        Ok(())
    })
}

/// Read `<head> <tail> <relation>` lines (tab or whitespace separated)
pub fn read_raw_triples(path: &Path) -> Result<Vec<RawTriple>> {
    let mut reader = LineReader::open(path)?;
    let mut triples = Vec::new();

    while let Some((line_no, line)) = reader.next_line()? {
        triples.push(parse_raw_triple(path, line_no, &line)?);
    }

    Ok(triples)
}

/// Parse one raw triple line
pub fn parse_raw_triple(path: &Path, line_no: usize, line: &str) -> Result<RawTriple> {
    let line = line.trim();
    let fields: Vec<&str> = if line.contains('\t') {
        line.split('\t').map(str::trim).collect()
    } else {
        line.split_whitespace().collect()
    };

    match fields.as_slice() {
        [head, tail, relation] if !head.is_empty() && !tail.is_empty() && !relation.is_empty() => {
            Ok(RawTriple::new(*head, *tail, *relation))
        }
        _ => Err(Error::parse(
            path,
            line_no,
            format!("expected 3 fields, found {}", fields.len()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_id_table_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("entity2id.txt");

        write_id_table(&path, vec![("New York", 0), ("Q42", 1)]).unwrap();
        let rows = read_id_table(&path).unwrap();
        assert_eq!(
            rows,
            vec![("New York".to_string(), 0), ("Q42".to_string(), 1)]
        );
    }

    #[test]
    fn test_id_table_rejects_bad_id() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("relation2id.txt");
        std::fs::write(&path, "born_in\t0\nlives_in\tone\n").unwrap();

        let err = read_id_table(&path).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
    }

    #[test]
    fn test_raw_triples() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("train.txt");
        std::fs::write(&path, "a\tb\tr\n\nc d s\n").unwrap();

        let triples = read_raw_triples(&path).unwrap();
        assert_eq!(
            triples,
            vec![RawTriple::new("a", "b", "r"), RawTriple::new("c", "d", "s")]
        );

        std::fs::write(&path, "a b\n").unwrap();
        assert!(matches!(
            read_raw_triples(&path),
            Err(Error::Parse { line: 1, .. })
        ));
    }
}
