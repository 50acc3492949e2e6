//! Filesystem utilities for lodge.
//!
//! Registry entries are published with atomic writes so that a concurrent
//! reader sees either the previous entry or the complete new one.

pub mod atomic;

pub use atomic::{atomic_write, atomic_write_file};
