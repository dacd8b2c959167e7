//! Query and presentation layer over the loaded documentation cache
//!
//! [`query`] holds the pure lookups, [`tools`] and [`resources`] adapt them
//! to the MCP tool and resource surfaces, and [`outputs`] renders results.

pub mod outputs;
pub mod query;
pub mod resources;
pub mod tools;
