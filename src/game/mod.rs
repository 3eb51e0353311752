//! Game simulation

pub mod arena;
pub mod bot;
pub mod food;
pub mod physics;
pub mod session;
pub mod worm;

pub use arena::Arena;
pub use food::Food;
pub use worm::Worm;
