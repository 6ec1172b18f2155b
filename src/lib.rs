//! Toolkit behind the haviwa browser-interaction script.
//!
//! The centrepiece is [`device::FingerprintDeriver`], which turns three
//! machine identifiers into a short, stable fingerprint. The rest is glue:
//! address ranges, a JSON POST helper, a bounded worker pool, and text and
//! file helpers.

pub mod config;
pub mod device;
pub mod network;
pub mod pool;
pub mod util;

pub use device::{derive_fingerprint, Fingerprint, FingerprintDeriver, IdentityError};
