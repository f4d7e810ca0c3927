pub mod activation;
pub mod improvements;
pub mod params;
pub mod predictor;
pub mod training;
pub mod types;

pub use activation::*;
pub use improvements::*;
pub use params::*;
pub use predictor::*;
pub use training::*;
pub use types::*;
