// Application layer: wires the adapters into the core from a BotConfig.

pub mod bot;

pub use bot::{Bot, TofuboiDispatcher};
