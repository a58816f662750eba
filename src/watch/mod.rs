// src/watch/mod.rs

//! Filesystem watching for watch mode.

pub mod watcher;

pub use watcher::{WatchEvent, WatcherHandle, spawn_watcher};
