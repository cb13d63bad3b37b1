//! Wire side of the simulator protocol: outbound requests and the
//! inbound breakpoint notification listener.

pub mod callback;
pub mod simulator;

pub use callback::{CallbackServer, HitHandler};
pub use simulator::{Simulator, SimulatorClient};
