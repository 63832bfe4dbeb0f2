//! Write side of the double-buffered tables

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use rayon::prelude::*;

use super::{cap_norm, EmbeddingTable};
use crate::error::{Error, Result};

/// Per-row locked copy of a table that workers update during a mini-batch
///
/// Workers read the committed [`EmbeddingTable`] and write here. Between
/// commits the two hold identical values for every untouched row.
pub struct WriteBuffer {
    name: &'static str,
    rows: Vec<Mutex<Vec<f32>>>,
    touched: Vec<AtomicBool>,
}

impl WriteBuffer {
    /// Copy of `table`; `name` labels numerical faults
    pub fn new(name: &'static str, table: &EmbeddingTable) -> Self {
        Self {
            name,
            rows: table.rows().map(|row| Mutex::new(row.to_vec())).collect(),
            touched: (0..table.len()).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Mutate row `id` under its lock and mark it for the next commit
    pub fn update<F>(&self, id: usize, f: F)
    where
        F: FnOnce(&mut [f32]),
    {
        let mut row = self.rows[id].lock();
        f(&mut row);
        self.touched[id].store(true, Ordering::Release);
    }

    /// Number of rows marked since the last commit
    pub fn pending(&self) -> usize {
        self.touched
            .iter()
            .filter(|flag| flag.load(Ordering::Acquire))
            .count()
    }

    /// Renormalize every touched row and copy it into `target`
    ///
    /// Runs once per mini-batch after all workers have finished. Returns the
    /// number of committed rows, or a numerical fault for the first
    /// non-finite row found.
    pub fn commit(&self, target: &mut EmbeddingTable, epoch: usize, batch: usize) -> Result<usize> {
        let dim = target.dim();
        let committed = AtomicUsize::new(0);

        target
            .as_flat_mut()
            .par_chunks_mut(dim)
            .enumerate()
            .try_for_each(|(id, out)| {
                if !self.touched[id].swap(false, Ordering::AcqRel) {
                    return Ok(());
                }

                let mut row = self.rows[id].lock();
                cap_norm(&mut row);
                if row.iter().any(|v| !v.is_finite()) {
                    return Err(Error::NumericalFault {
                        table: self.name,
                        id,
                        epoch,
                        batch,
                    });
                }

                out.copy_from_slice(&row);
                committed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })?;

        Ok(committed.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::l2_norm;

    #[test]
    fn test_reads_see_old_values_until_commit() {
        let mut table = EmbeddingTable::from_rows(vec![vec![0.1, 0.0], vec![0.0, 0.1]]).unwrap();
        let buffer = WriteBuffer::new("entity", &table);

        buffer.update(1, |row| row[0] = 3.0);
        buffer.update(1, |row| row[1] = 4.0);
        assert_eq!(table.row(1), &[0.0, 0.1]);
        assert_eq!(buffer.pending(), 1);

        let committed = buffer.commit(&mut table, 0, 0).unwrap();
        assert_eq!(committed, 1);
        assert!((l2_norm(table.row(1)) - 1.0).abs() < 1e-6);
        assert!((table.row(1)[0] - 0.6).abs() < 1e-6);
        assert_eq!(table.row(0), &[0.1, 0.0]);
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn test_non_finite_row_is_fatal() {
        let mut table = EmbeddingTable::zeros(3, 2);
        let buffer = WriteBuffer::new("relation", &table);
        buffer.update(2, |row| row[0] = f32::NAN);

        match buffer.commit(&mut table, 4, 17) {
            Err(Error::NumericalFault {
                table,
                id,
                epoch,
                batch,
            }) => {
                assert_eq!((table, id, epoch, batch), ("relation", 2, 4, 17));
            }
            other => panic!("expected numerical fault, got {:?}", other),
        }
    }

    #[test]
    fn test_concurrent_updates_are_serialized_per_row() {
        let mut table = EmbeddingTable::zeros(1, 1);
        let buffer = WriteBuffer::new("entity", &table);

        (0..1000).into_par_iter().for_each(|_| {
            buffer.update(0, |row| row[0] += 0.001);
        });
        buffer.commit(&mut table, 0, 0).unwrap();
        assert!((table.row(0)[0] - 1.0).abs() < 1e-3);
    }
}
