use crate::errors::DriverError;
use crate::location::Location;
use crate::r2_api::{R2Api, R2Result};

/// Read-only description of one sweep, shared by every worker.
///
/// `input_width` is the number of bytes cleared and written for a
/// memory input (at least 1), `output_width` the number of bytes read
/// for a memory output (1, 2, 4 or 8). Neither is used for register
/// locations.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub target: String,
    pub start: String,
    pub stop: String,
    pub input: Location,
    pub output: Location,
    pub input_width: usize,
    pub output_width: usize,
    pub commands: Vec<String>,
    pub stdin_file: Option<String>,
    pub jump: bool,
}

/// The debugger operations one sweep value needs. Implemented by
/// [`R2Api`], tests substitute a deterministic mock.
pub trait Debugger {
    fn stdin_redirect(&mut self, path: &str) -> R2Result<()>;
    fn reopen(&mut self) -> R2Result<()>;
    fn breakpoint(&mut self, address: &str) -> R2Result<()>;
    fn cont(&mut self) -> R2Result<()>;
    fn command(&mut self, cmd: &str) -> R2Result<String>;
    fn set_register(&mut self, reg: &str, value: u64) -> R2Result<()>;
    fn get_register(&mut self, reg: &str) -> R2Result<u64>;
    fn set_instruction_pointer(&mut self, address: &str) -> R2Result<()>;
    fn write_zeros(&mut self, length: usize, address: &str) -> R2Result<()>;
    fn write_hex(&mut self, hex: &str, address: &str) -> R2Result<()>;
    fn read_value(&mut self, length: usize, address: &str) -> R2Result<u64>;
    fn close(&mut self);
}

impl Debugger for R2Api {
    fn stdin_redirect(&mut self, path: &str) -> R2Result<()> {
        R2Api::stdin_redirect(self, path)
    }

    fn reopen(&mut self) -> R2Result<()> {
        R2Api::reopen(self)
    }

    fn breakpoint(&mut self, address: &str) -> R2Result<()> {
        R2Api::breakpoint(self, address)
    }

    fn cont(&mut self) -> R2Result<()> {
        R2Api::cont(self)
    }

    fn command(&mut self, cmd: &str) -> R2Result<String> {
        self.cmd(cmd)
    }

    fn set_register(&mut self, reg: &str, value: u64) -> R2Result<()> {
        R2Api::set_register(self, reg, value)
    }

    fn get_register(&mut self, reg: &str) -> R2Result<u64> {
        R2Api::get_register(self, reg)
    }

    fn set_instruction_pointer(&mut self, address: &str) -> R2Result<()> {
        R2Api::set_instruction_pointer(self, address)
    }

    fn write_zeros(&mut self, length: usize, address: &str) -> R2Result<()> {
        R2Api::write_zeros(self, length, address)
    }

    fn write_hex(&mut self, hex: &str, address: &str) -> R2Result<()> {
        R2Api::write_hex(self, hex, address)
    }

    fn read_value(&mut self, length: usize, address: &str) -> R2Result<u64> {
        R2Api::read_value(self, length, address)
    }

    fn close(&mut self) {
        R2Api::close(self)
    }
}

/// One sampled (input, output) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResultPoint {
    pub input: u64,
    pub output: u64,
}

/// Open a fresh r2 debug session against the target executable.
pub fn open_target(path: &str) -> Result<R2Api, DriverError> {
    R2Api::new(path).map_err(|reason| DriverError::SessionOpen {
        path: path.to_owned(),
        reason,
    })
}

/// An owned debug session, scoped to one sweep value. The underlying
/// debugger is closed on drop, so every exit path releases its r2
/// process.
pub struct Session<D: Debugger> {
    dbg: D,
}

impl<D: Debugger> Session<D> {
    pub fn new(dbg: D) -> Session<D> {
        Session { dbg }
    }

    /// Run one full debug cycle for one input value: position
    /// execution at the start address, inject the value, continue to
    /// the stop address, read the output back.
    pub fn run(&mut self, config: &SessionConfig, value: u64) -> Result<ResultPoint, DriverError> {
        if let Some(path) = &config.stdin_file {
            self.dbg
                .stdin_redirect(path)
                .map_err(|reason| command_error(format!("stdin redirect to {}", path), reason))?;
        }

        self.dbg
            .reopen()
            .map_err(|reason| command_error("reopen".to_owned(), reason))?;

        self.dbg
            .breakpoint(&config.stop)
            .map_err(|reason| command_error(format!("breakpoint at {}", config.stop), reason))?;

        if config.jump {
            self.dbg
                .set_instruction_pointer(&config.start)
                .map_err(|reason| command_error(format!("jump to {}", config.start), reason))?;
        } else {
            self.dbg
                .breakpoint(&config.start)
                .map_err(|reason| command_error(format!("breakpoint at {}", config.start), reason))?;
            self.dbg
                .cont()
                .map_err(|reason| command_error("continue".to_owned(), reason))?;
            self.expect_stopped(&config.start)?;
        }

        for command in &config.commands {
            self.dbg
                .command(command)
                .map_err(|reason| command_error(format!("pre-command {:?}", command), reason))?;
        }

        self.inject(config, value)?;

        self.dbg
            .cont()
            .map_err(|reason| command_error("continue".to_owned(), reason))?;
        self.expect_stopped(&config.stop)?;

        let output = self.extract(config)?;
        Ok(ResultPoint {
            input: value,
            output,
        })
    }

    fn inject(&mut self, config: &SessionConfig, value: u64) -> Result<(), DriverError> {
        match &config.input {
            Location::Register(reg) => {
                self.dbg
                    .set_register(reg, value)
                    .map_err(|reason| access_error(&config.input, reason))
            }
            Location::Memory(expr) => {
                let width = config.input_width;
                if width < 8 && value >> (8 * width) != 0 {
                    return Err(DriverError::ValueTooWide { value, width });
                }
                self.dbg
                    .write_zeros(width, expr)
                    .map_err(|reason| access_error(&config.input, reason))?;
                self.dbg
                    .write_hex(format!("{:x}", value).as_str(), expr)
                    .map_err(|reason| access_error(&config.input, reason))
            }
        }
    }

    fn extract(&mut self, config: &SessionConfig) -> Result<u64, DriverError> {
        match &config.output {
            Location::Register(reg) => self
                .dbg
                .get_register(reg)
                .map_err(|reason| access_error(&config.output, reason)),
            Location::Memory(expr) => self
                .dbg
                .read_value(config.output_width, expr)
                .map_err(|reason| access_error(&config.output, reason)),
        }
    }

    // A dead target has no register file, so a PC read distinguishes
    // "stopped at the breakpoint" from "exited before reaching it".
    fn expect_stopped(&mut self, address: &str) -> Result<(), DriverError> {
        match self.dbg.get_register("PC") {
            Ok(_) => Ok(()),
            Err(_) => Err(DriverError::BreakpointNotReached {
                address: address.to_owned(),
            }),
        }
    }
}

impl<D: Debugger> Drop for Session<D> {
    fn drop(&mut self) {
        self.dbg.close();
    }
}

fn command_error(operation: String, reason: String) -> DriverError {
    DriverError::CommandExecution { operation, reason }
}

fn access_error(location: &Location, reason: String) -> DriverError {
    DriverError::LocationAccess {
        location: location.to_string(),
        reason,
    }
}
