//! Cross-cutting utilities.

pub mod fs;

pub use fs::{atomic_write, copy_dir, ensure_dir, move_dir, remove_path};
