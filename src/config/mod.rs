//! Configuration for lodge.
//!
//! Read from a YAML file located by [`LodgeConfig::resolve`]. Unknown fields
//! are ignored for forward compatibility and every field has a default, so
//! an empty or missing file is a valid configuration.

mod model;
mod operations;

#[cfg(test)]
mod tests;

pub use model::LodgeConfig;
pub use operations::{CONFIG_ENV_VAR, default_config_path};
