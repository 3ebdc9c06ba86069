pub mod cli;
pub mod compare;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod resolve;

pub use error::{ResolveError, Result};
