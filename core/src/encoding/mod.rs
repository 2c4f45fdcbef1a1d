//! Window encoders: one text and one image rendering per style.

pub mod canvas;
pub mod image;
mod signals;
pub mod style;
pub mod text;

pub use self::image::ImageEncoder;
pub use canvas::{Canvas, MAX_SIDE_PX};
pub use style::{catalog_text, EncodingStyle, StyleArgs};
pub use text::TextEncoder;
