//! Core constants and error types shared by the codec and the controller.

pub mod constants;
pub mod error;

pub use constants::*;
pub use error::*;
