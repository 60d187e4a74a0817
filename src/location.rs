use crate::errors::GrapherError;
use std::fmt;

/// Where a swept or recorded value lives: a named register, or a
/// memory address expression understood by r2 (the expression may
/// itself reference registers, e.g. `rbp-0x8`).
///
/// Memory expressions are kept verbatim and handed to r2 unchanged,
/// malformed ones are rejected by the debugger at use time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Register(String),
    Memory(String),
}

impl Location {
    /// Classify a raw descriptor: `m[<expr>]` is memory, anything
    /// else is a register name.
    pub fn parse(descriptor: &str) -> Result<Location, GrapherError> {
        if let Some(rest) = descriptor.strip_prefix("m[") {
            if let Some(expr) = rest.strip_suffix(']') {
                Ok(Location::Memory(expr.to_owned()))
            } else {
                Err(GrapherError::InvalidLocation {
                    descriptor: descriptor.to_owned(),
                    reason: "memory location is missing the closing ]".to_owned(),
                })
            }
        } else {
            Ok(Location::Register(descriptor.to_owned()))
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, Location::Memory(_))
    }

    /// The register name or address expression without the `m[...]`
    /// wrapper.
    pub fn expression(&self) -> &str {
        match self {
            Location::Register(name) => name,
            Location::Memory(expr) => expr,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Register(name) => write!(f, "{}", name),
            Location::Memory(expr) => write!(f, "m[{}]", expr),
        }
    }
}
