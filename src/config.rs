//! Configuration loading and data types
//!
//! Configuration comes from `chunker.config.{toml,yaml,yml,json}` found by
//! walking parent directories, then `~/.chunker/config.*`, with
//! `CHUNKER_`-prefixed environment overrides and `${VAR}` substitution in
//! string values.

pub mod loader;
pub mod types;

pub use loader::{apply_env_overrides, expand_str, find_config, load_config, load_or_default};
pub use types::{ChunkerConfig, CoreSection, PluginConfig, ProcessorSettings};
