//! # Cache Module
//!
//! This module loads pre-generated documentation libraries from disk and keeps
//! them in memory as hierarchical trees.
//!
//! ## Key Components
//!
//! - [`manifest`] - Parses and validates a library's `index.json`
//! - [`variants`] - Loads the markdown variant files of a node
//! - [`tree`] - Builds the node tree from the flat manifest map
//! - [`service`] - Registry of all loaded libraries
//! - [`types`] - Type definitions for library names and document paths
//! - [`constants`] - File and directory names

pub mod constants;
pub mod manifest;
pub mod service;
pub mod tree;
pub mod types;
pub mod variants;

pub use service::{Library, LibraryCache, LibrarySummary};
