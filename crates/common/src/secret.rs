//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports [`secrecy`] so every crate in the workspace reaches for the
//! same wrapper. `SecretString` redacts itself in `Debug` output and is
//! zeroized on drop, so structs that derive `Debug` stay safe to log.
//!
//! Use `SecretString` for media transport API secrets and any other
//! credential read from the environment. Call `expose_secret()` only at the
//! point where the raw value is handed to a signer.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct IssuerKeys {
//!     api_key: String,
//!     api_secret: SecretString,
//! }
//!
//! let keys = IssuerKeys {
//!     api_key: "APIabc".to_string(),
//!     api_secret: SecretString::from("s3cr3t"),
//! };
//!
//! assert!(!format!("{keys:?}").contains("s3cr3t"));
//! assert_eq!(keys.api_secret.expose_secret(), "s3cr3t");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
