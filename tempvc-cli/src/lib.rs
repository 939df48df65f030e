//! Offline tooling for TempVC
//!
//! Scripted simulation of guild activity against the in-memory platform.

pub mod script;
pub mod simulate;

pub use script::{Script, Step};
pub use simulate::{Simulation, SimulationState};
