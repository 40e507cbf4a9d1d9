pub mod config;
pub mod error;
pub mod types;

pub use error::{DecError, DecResult};
pub use types::{CipherVariant, Geometry, OperationParameters};
