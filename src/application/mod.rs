//! Application layer orchestrating payment recording.
//!
//! `PaymentService` wraps the pure allocator with the read-allocate-write sequence,
//! serialized per client.

pub mod service;
