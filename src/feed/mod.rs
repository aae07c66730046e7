//! Producers of measurements: wire payload decoding, canned scenarios and a
//! simulated ranging network.

mod generator;
mod payload;
mod scenario;

pub use generator::LiveNetwork;
pub use payload::{PayloadError, decode_triples};
pub use scenario::{Scenario, UnknownScenario};
