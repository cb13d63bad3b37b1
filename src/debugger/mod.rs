pub mod core;
pub mod breakpoint;
pub mod error;
pub mod variables;
