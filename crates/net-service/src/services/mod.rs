//! Domain services for the net session model.
//!
//! Mutating operations each run in one transaction and return the updated
//! rows; publishing the resulting events is the net actor's job.

pub mod authorization;
pub mod chat;
pub mod media_credentials;
pub mod roles;
pub mod session_registry;
pub mod speak_requests;

pub use chat::ChatService;
pub use media_credentials::{CredentialIssuer, MediaCredentialAdapter};
pub use roles::RoleService;
pub use session_registry::{JoinState, SessionRegistry};
pub use speak_requests::SpeakRequestArbiter;

// Mock issuer exposed for integration tests
#[allow(unused_imports)]
pub use media_credentials::mock::MockCredentialIssuer;
