// Adapters layer: HTTP implementations of the domain ports.

pub mod telegram;
pub mod youtube;

pub use telegram::TelegramClient;
pub use youtube::YoutubeClient;
