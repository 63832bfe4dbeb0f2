//! Atomic artifact writes
//!
//! Artifacts are written to a sibling `.tmp` file, flushed with `sync_all()`
//! and renamed over the destination, so a file on disk is either the previous
//! complete version or the new complete version.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::Result;

/// Atomically replace `path` with `content`
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    atomic_write_with(path, |file| file.write_all(content.as_bytes()))
}

/// Atomically replace `path` with whatever `write_fn` writes
///
/// Large artifacts (vectors, path records) stream through a buffered writer
/// instead of being built in memory first.
///
/// ```ignore
/// atomic_write_with("data/path2.txt", |file| {
///     writeln!(file, "0 1")?;
///     writeln!(file, "1 1 0 1.0000")?;
///     Ok(())
/// })?;
/// ```
pub fn atomic_write_with<P, F>(path: P, write_fn: F) -> Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let path = path.as_ref();
    let temp_path = path.with_extension("tmp");

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let written = File::create(&temp_path).and_then(|file| {
        let mut writer = BufWriter::new(file);
        write_fn(&mut writer)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    });
    if let Err(e) = written {
        // drop the partial temp file, the destination is untouched
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Remove `.tmp` files left behind by an interrupted run
pub fn cleanup_temp_files<P: AsRef<Path>>(dir: P) -> Result<usize> {
    let dir = dir.as_ref();
    let mut cleaned = 0;

    if !dir.exists() {
        return Ok(0);
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map(|e| e == "tmp").unwrap_or(false) {
            fs::remove_file(&path)?;
            cleaned += 1;
        }
    }

    Ok(cleaned)
}
