//! Hashing and device identity.

pub mod hash;
pub mod keystore;

pub use hash::sha256_hex;
pub use keystore::{DeviceKey, KeyStore};
