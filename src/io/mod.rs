//! Plain-text artifact codecs
//!
//! Every artifact is whitespace delimited with one logical record per line,
//! except `path2`, `confidence` and `<split>_pra`, whose records span a header
//! line and a body line. Readers are strict: any unexpected token count,
//! residual token or missing body line is a [`Parse`](crate::Error::Parse)
//! error naming the file and line. Writers go through
//! [`atomic_write_with`](crate::utils::atomic_write_with).

mod paths;
mod tables;
mod tokens;
mod vectors;

pub use paths::{
    read_confidences, read_path_records, read_path_resources, write_confidences,
    write_path_records, write_path_resources,
};
pub use tables::{
    parse_raw_triple, read_id_table, read_raw_triples, write_id_table, write_raw_triples,
};
pub use tokens::{parse_path, LineReader, LineTokens, PATH_SEPARATOR};
pub use vectors::{read_vectors, write_vectors, VECTOR_PRECISION};
