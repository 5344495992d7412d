//! Key-value persistence for ZeroKey account records.
//!
//! The account layer only ever stores ciphertext, salts, and public keys,
//! so backends need no confidentiality of their own. What they must give
//! is atomic multi-key writes: a password change replaces the wrapped
//! master key and its salt together or not at all.

pub mod keys;
pub mod local;
pub mod memory;
pub mod store;

pub use keys::{CredentialKeys, DEFAULT_NAMESPACE};
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use store::KeyValueStore;
