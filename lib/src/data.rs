pub mod prepare;
pub mod record;

pub use prepare::*;
pub use record::*;
