//! Database models.

pub mod api_key;
pub mod image;
pub mod suggestion;

pub use api_key::ApiKey;
pub use image::Image;
pub use suggestion::Suggestion;
