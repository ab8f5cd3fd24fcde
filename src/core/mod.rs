pub mod dispatcher;
pub mod formatter;
pub mod handler;
pub mod transcript;

pub use crate::domain::model::{
    CaptionTrack, Chat, FetchOutcome, Message, TranscriptEntry, TranscriptRequest, Update, User,
};
pub use crate::domain::ports::{Messenger, TranscriptSource, UpdateSource};
pub use crate::utils::error::Result;
