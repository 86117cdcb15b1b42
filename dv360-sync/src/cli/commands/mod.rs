pub mod kinds;
pub mod pull;
pub mod sync;
