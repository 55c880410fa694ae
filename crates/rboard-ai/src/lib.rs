//! External AI capability clients.
//!
//! This crate wraps the two generative capabilities the engine consumes:
//! - Text understanding: structured JSON output against a schema
//! - Image generation: prompt parts (text + reference images) in, image out
//!
//! Both are traits so the engine and tests can swap backends. Two image
//! backends ship: a synchronous HTTP backend and a submit-then-poll backend;
//! callers always await a final result either way.

pub mod error;
pub mod image;
pub mod text;

pub use error::{AiError, AiResult};
pub use image::{
    image_capability_from_env, GeminiImage, GeminiImageConfig, ImageCapability, ImageOutput,
    PolledImage, PolledImageConfig, PromptPart, MAX_IMAGE_PARTS,
};
pub use text::{generate, GeminiText, GeminiTextConfig, TextCapability};
