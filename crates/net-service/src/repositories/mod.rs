//! Repository layer for the net record store.
//!
//! Every function takes `&mut SqliteConnection` so a command can run all of
//! its reads and writes inside one transaction (`&mut *tx`).

pub mod messages;
pub mod nets;
pub mod participants;
pub mod speak_requests;
pub mod users;

pub use messages::MessagesRepository;
pub use nets::NetsRepository;
pub use participants::ParticipantsRepository;
pub use speak_requests::SpeakRequestsRepository;
pub use users::UsersRepository;
