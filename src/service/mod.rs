pub mod bootstrap;
pub mod wire;

pub use bootstrap::init_tracing;
pub use wire::{ApplicationContext, initialize, initialize_with};
