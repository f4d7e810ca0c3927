pub use predict::*;
pub use sweep::*;
pub use train::*;

pub mod predict;
pub mod sweep;
pub mod train;
