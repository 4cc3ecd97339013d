//! HTTP middleware components.

pub mod api_token;

pub use api_token::authenticate_api_key;
