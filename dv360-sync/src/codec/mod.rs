//! Conversion between sheet rows and API resources

pub mod entity;
pub mod mask;
pub mod path;
pub mod translate;

pub use entity::{EntityCodec, reserved};
pub use mask::{changed_fields, compute_mask, loosely_equal, overlay};
pub use translate::{Translator, TranslatorKind, TranslatorSet};
