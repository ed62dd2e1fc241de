//! Actor hierarchy for net commands.
//!
//! ```text
//! NetControllerActor (singleton)
//! └── supervises N NetActors
//!     └── NetActor (one per live net, single writer for that net)
//! ```
//!
//! - **Per-net serialization**: every mutating command for a net runs inside
//!   its actor, so check-then-act sequences cannot interleave
//! - **CancellationToken propagation**: net actors run on child tokens of
//!   the controller's root token
//! - **Mailbox monitoring**: depth thresholds (Controller: 100/500, Net: 50/200)
//!
//! Reads go straight to the database and never pass through an actor.

pub mod controller;
pub mod messages;
pub mod metrics;
pub mod net;

pub use controller::{NetControllerActor, NetControllerHandle};
pub use messages::{ControllerMessage, ControllerStatus, NetActorState, NetMessage};
pub use metrics::{ActorType, MailboxMonitor};
pub use net::{NetActor, NetActorHandle, NetContext};
