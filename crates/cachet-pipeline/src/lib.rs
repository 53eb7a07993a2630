//! cachet-pipeline: chunked file encryption over a framed on-disk layout
//!
//! Framed body (after the optional envelope header):
//!
//! ```text
//! [16-byte IV][separator][ciphertext chunk][separator] ... [ciphertext chunk][separator]
//! ```
//!
//! The separator is a fixed ASCII token, not a length prefix; readers scan
//! for it. Output is written to `<path>.tmp` and promoted by rename only
//! when the whole run succeeds.

pub mod engine;
pub mod frame;

pub use engine::{decrypt_file, encrypt_file, KeySource, ProgressFn, RunSummary};
pub use frame::{RecordReader, RecordWriter, SEPARATOR};
