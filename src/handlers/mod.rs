mod analyze;
mod error;
mod health;

pub use analyze::*;
pub use error::*;
pub use health::*;
