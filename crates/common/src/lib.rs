pub mod config;
pub mod error;
pub mod ids;
pub mod types;
pub mod validation;

pub use error::{FieldViolation, ReviewError, SchemaValidationError};
pub use ids::*;
