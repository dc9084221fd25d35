//! Seiscope - SEI metadata inspection tool
//!
//! This library crate exposes configuration and output rendering for the
//! `seiscope` binary and its integration tests. Parsing lives in
//! `seiscope-probe`.

pub mod config;
pub mod output;
