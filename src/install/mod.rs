//! Export of cached libraries into a project-local markdown tree

pub mod installer;

pub use installer::{EssenceNode, InstallReport, Installer};
