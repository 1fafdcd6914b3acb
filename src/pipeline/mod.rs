//! Pipeline stages for one DOCX-to-PNG submission.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the HTTP transport can be swapped without touching the session.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ upload ──▶ response
//! (bytes)   (multipart POST)  (archive or error body)
//! ```
//!
//! 1. [`input`]   : read a local document into an [`input::InputFile`]
//! 2. [`upload`]  : send it to the conversion service; the only stage with
//!    network I/O
//! 3. [`response`]: turn a failed response body into a human-readable reason

pub mod input;
pub mod response;
pub mod upload;
