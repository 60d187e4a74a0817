/// Errors for invalid configuration and failed debug sessions
pub mod errors;
/// Classify input/output descriptors as registers or memory
pub mod location;
/// Print swept pairs and render them as a scatter plot
pub mod plot;
/// Interact with the radare2 instance
pub mod r2_api;
/// Expand a textual range into the values to brute force
pub mod range;
/// Drive one debug session for one candidate value
pub mod session;
/// Fan sweep values across a pool of debug sessions
pub mod sweep;
#[cfg(test)]
mod test;

pub use crate::errors::{DriverError, GrapherError};
pub use crate::location::Location;
pub use crate::range::SweepSpec;
pub use crate::session::{open_target, Debugger, ResultPoint, Session, SessionConfig};
pub use crate::sweep::{sweep, SweepFault, SweepOutcome};
