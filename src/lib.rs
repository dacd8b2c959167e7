pub mod cache;
pub mod config;
pub mod docs;
pub mod install;
pub mod repo;
pub mod service;

pub use cache::{Library, LibraryCache, LibrarySummary};
pub use service::LovelyDocsService;
