pub mod learned;
pub mod random;
pub mod registry;

pub use random::RandomWalkBot;
pub use registry::{BotKind, create_bot};
