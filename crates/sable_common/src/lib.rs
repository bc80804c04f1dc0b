pub mod config;
pub mod error;

pub use error::{ErrorKind, SableError, SableResult};
