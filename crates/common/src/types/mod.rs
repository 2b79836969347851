mod clause;
mod review;
mod risk;
mod user_context;

pub use clause::*;
pub use review::*;
pub use risk::*;
pub use user_context::*;
