pub mod order;
pub mod stats;

pub use order::*;
pub use stats::*;
