use thiserror::Error;

/// Errors that abort the run before any sweep work starts, plus the
/// plotting surface. A sweep must never partially start with an
/// invalid configuration.
#[derive(Error, Debug)]
pub enum GrapherError {
    #[error("invalid range {spec:?}: {reason}")]
    InvalidRange { spec: String, reason: String },

    #[error("invalid location {descriptor:?}: {reason}")]
    InvalidLocation { descriptor: String, reason: String },

    #[error("invalid {field} {value:?}: {reason}")]
    InvalidArgument {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("could not render plot to {path:?}: {reason}")]
    Plot { path: String, reason: String },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Failures of a single debug session. These are isolated to the one
/// input value the session was running, the rest of the sweep
/// continues without it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("could not open a debug session for {path:?}: {reason}")]
    SessionOpen { path: String, reason: String },

    #[error("target never reached the breakpoint at {address}")]
    BreakpointNotReached { address: String },

    #[error("cannot access {location}: {reason}")]
    LocationAccess { location: String, reason: String },

    #[error("debugger {operation} failed: {reason}")]
    CommandExecution { operation: String, reason: String },

    #[error("value {value:#x} does not fit in {width} byte(s), raise --input-length")]
    ValueTooWide { value: u64, width: usize },
}
