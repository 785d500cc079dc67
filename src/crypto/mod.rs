//! Hashing and unlock verification

pub mod hash;
pub mod unlock;

pub use hash::{Hash256, Hashable};
pub use unlock::{PlainTokenVerifier, UnlockVerifier};
