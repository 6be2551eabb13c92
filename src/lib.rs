pub mod color;
pub mod commands;
pub mod error;
pub mod protocols;
pub mod reconciler;
pub mod sampler;
pub mod settings;
pub mod status;
pub mod tuya;

#[cfg(test)]
mod mock;

pub use error::{Error, Result};
