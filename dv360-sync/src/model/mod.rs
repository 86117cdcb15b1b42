//! Resource schema: kinds and typed instances

mod kind;
mod resource;

pub use kind::*;
pub use resource::*;
