pub mod data;
pub mod error;
pub mod model;
pub mod subcommands;
pub mod sweep;
pub mod utils;

pub use error::{Error, Result};
