//! Server module for Alembic
//!
//! # Module Structure
//!
//! - `config`: Configuration structures
//! - `loader`: Configuration loading from files and environment
//! - `shutdown`: Signal handling and cancellation
//! - `init`: Router assembly and the run loop

pub mod config;
mod init;
mod loader;
mod shutdown;

pub use init::{build_resolver, run};
pub use loader::load_config;
