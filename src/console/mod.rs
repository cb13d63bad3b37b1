pub mod app;
pub mod events;
pub mod views;

pub use app::{Command, Console};
pub use events::{Event, Events};
