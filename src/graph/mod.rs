//! Graph index, positive-triple set and dataset preparation

mod index;
mod positive;
mod source;
mod split;

pub use index::{inverse_relation, GraphIndex};
pub use positive::PositiveTriples;
pub use source::{TripleSource, TsvSource, VecSource};
pub use split::{split_dataset, DatasetSplit, SplitConfig};
