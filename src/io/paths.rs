//! `path2`, `confidence` and `<split>_pra` codecs

use std::io::{self, Write};
use std::path::Path;

use crate::error::Result;
use crate::pcra::{ConfidenceTable, PathResourceTable};
use crate::types::{EntityPair, PathRecord, PathShare, Triple};
use crate::utils::atomic_write_with;

use super::tokens::{LineReader, LineTokens};

/// Persisted shares keep 4 decimals
const SHARE_SCALE: f64 = 10_000.0;

/// Slack below the last kept digit for f32 representation error, so 0.7
/// is written as 0.7000 rather than 0.6999
const SHARE_SLACK: f64 = 1e-3;

/// Write one path-share body line: `<count> {<len> <path> <share>}*`
///
/// Shares are truncated, not rounded, to 4 decimals so the reloaded shares
/// of a pair still sum to at most 1.
fn write_shares<W: Write>(out: &mut W, paths: &[PathShare]) -> io::Result<()> {
    write!(out, "{}", paths.len())?;
    for share in paths {
        let truncated = (share.share as f64 * SHARE_SCALE + SHARE_SLACK).floor() / SHARE_SCALE;
        write!(out, " {} {} {:.4}", share.path.len(), share.path, truncated)?;
    }
    writeln!(out)
}

fn read_shares(mut tokens: LineTokens<'_>) -> Result<Vec<PathShare>> {
    let count = tokens.next_usize("path count")?;
    let mut paths = Vec::with_capacity(count);
    for _ in 0..count {
        let path = tokens.next_path()?;
        let share = tokens.next_f32("resource share")?;
        paths.push(PathShare::new(path, share));
    }
    tokens.finish()?;
    Ok(paths)
}

/// Write the pair-level resource table (`path2`)
pub fn write_path_resources(path: &Path, table: &PathResourceTable) -> Result<()> {
    atomic_write_with(path, |file| {
        for (pair, paths) in table.iter() {
            writeln!(file, "{} {}", pair.head, pair.tail)?;
            write_shares(file, paths)?;
        }
        Ok(())
    })
}

/// Read a `path2` artifact
pub fn read_path_resources(path: &Path) -> Result<PathResourceTable> {
    let mut reader = LineReader::open(path)?;
    let mut table = PathResourceTable::new();

    while let Some((header_no, header)) = reader.next_line()? {
        let mut tokens = LineTokens::new(path, header_no, &header);
        let head = tokens.next_usize("head id")?;
        let tail = tokens.next_usize("tail id")?;
        tokens.finish()?;

        let (body_no, body) = reader.body_line(header_no)?;
        let paths = read_shares(LineTokens::new(path, body_no, &body))?;
        table.insert(EntityPair::new(head, tail), paths);
    }

    Ok(table)
}

/// Write the path → relation confidence table (`confidence`)
pub fn write_confidences(path: &Path, table: &ConfidenceTable) -> Result<()> {
    atomic_write_with(path, |file| {
        for (relation_path, rows) in table.groups() {
            writeln!(file, "{} {}", relation_path.len(), relation_path)?;
            write!(file, "{}", rows.len())?;
            for (relation, confidence) in rows {
                write!(file, " {} {:.4}", relation, confidence)?;
            }
            writeln!(file)?;
        }
        Ok(())
    })
}

/// Read a `confidence` artifact
pub fn read_confidences(path: &Path) -> Result<ConfidenceTable> {
    let mut reader = LineReader::open(path)?;
    let mut table = ConfidenceTable::new();

    while let Some((header_no, header)) = reader.next_line()? {
        let mut tokens = LineTokens::new(path, header_no, &header);
        let relation_path = tokens.next_path()?;
        tokens.finish()?;

        let (body_no, body) = reader.body_line(header_no)?;
        let mut tokens = LineTokens::new(path, body_no, &body);
        let count = tokens.next_usize("relation count")?;
        for _ in 0..count {
            let relation = tokens.next_usize("relation id")?;
            let confidence = tokens.next_f32("confidence")?;
            table.insert(relation_path.clone(), relation, confidence);
        }
        tokens.finish()?;
    }

    Ok(table)
}

/// Write per-triple path records (`<split>_pra`)
pub fn write_path_records(path: &Path, records: &[PathRecord]) -> Result<()> {
    atomic_write_with(path, |file| {
        for record in records {
            let triple = record.triple;
            writeln!(file, "{} {} {}", triple.head, triple.tail, triple.relation)?;
            write_shares(file, &record.paths)?;
        }
        Ok(())
    })
}

/// Read a `<split>_pra` artifact
pub fn read_path_records(path: &Path) -> Result<Vec<PathRecord>> {
    let mut reader = LineReader::open(path)?;
    let mut records = Vec::new();

    while let Some((header_no, header)) = reader.next_line()? {
        let mut tokens = LineTokens::new(path, header_no, &header);
        let head = tokens.next_usize("head id")?;
        let tail = tokens.next_usize("tail id")?;
        let relation = tokens.next_usize("relation id")?;
        tokens.finish()?;

        let (body_no, body) = reader.body_line(header_no)?;
        let paths = read_shares(LineTokens::new(path, body_no, &body))?;
        records.push(PathRecord::new(Triple::new(head, relation, tail), paths));
    }

    Ok(records)
}
