//! Account key lifecycle for ZeroKey.
//!
//! This crate owns everything that ties keys to an account:
//! - Registration, login (with optional second factor), lock, unlock,
//!   logout, and password change
//! - The in-memory session key store
//! - Persisted account records and upload metadata
//! - Engine configuration
//!
//! # Key hierarchy
//! ```text
//! password + salt --PBKDF2--> password key
//!                                 | wraps
//!                                 v
//!                             master key --encrypts--> names, file contents
//!                                 | encrypts
//!                                 v
//!                          RSA private key --unwraps--> shared file keys
//! ```

pub mod config;
pub mod manager;
pub mod records;
pub mod session;
pub mod state;

pub use config::EngineConfig;
pub use manager::{AccountComponents, AccountManager};
pub use records::{AccountRecord, DownloadedFile, FileUploadMetadata, PreparedUpload, RecordVersion};
pub use session::{SessionHandle, SessionKeyStore};
pub use state::AccountState;
