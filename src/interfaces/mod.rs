//! Batch front-ends.

pub mod csv;
