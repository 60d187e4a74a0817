use crate::errors::DriverError;
use crate::location::Location;
use crate::r2_api::{parse_hex, R2Result};
use crate::range::SweepSpec;
use crate::session::{Debugger, ResultPoint, Session, SessionConfig};
use crate::sweep::{sweep, SweepOutcome};

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Deterministic stand-in for r2: whatever value is injected at
/// `input`, continuing stores `compute(value)` at `output`.
#[derive(Clone)]
struct MockDebugger {
    input: Location,
    output: Location,
    compute: fn(u64) -> u64,
    dead_inputs: Vec<u64>,
    hang_inputs: Vec<u64>,
    regs: HashMap<String, u64>,
    mem: HashMap<String, u64>,
    alive: bool,
    closes: Arc<AtomicUsize>,
    command_log: Arc<Mutex<Vec<String>>>,
}

impl MockDebugger {
    fn new(config: &SessionConfig, compute: fn(u64) -> u64) -> MockDebugger {
        MockDebugger {
            input: config.input.clone(),
            output: config.output.clone(),
            compute,
            dead_inputs: vec![],
            hang_inputs: vec![],
            regs: HashMap::new(),
            mem: HashMap::new(),
            alive: false,
            closes: Arc::new(AtomicUsize::new(0)),
            command_log: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Inputs whose run exits before reaching the stop breakpoint.
    fn with_dead(mut self, inputs: &[u64]) -> MockDebugger {
        self.dead_inputs = inputs.to_vec();
        self
    }

    /// Inputs whose run blocks well past any sweep timeout.
    fn with_hang(mut self, inputs: &[u64]) -> MockDebugger {
        self.hang_inputs = inputs.to_vec();
        self
    }

    fn current_input(&self) -> u64 {
        match &self.input {
            Location::Register(reg) => self.regs.get(reg).copied().unwrap_or(0),
            Location::Memory(expr) => self.mem.get(expr).copied().unwrap_or(0),
        }
    }

    fn store_output(&mut self, value: u64) {
        match self.output.clone() {
            Location::Register(reg) => {
                self.regs.insert(reg, value);
            }
            Location::Memory(expr) => {
                self.mem.insert(expr, value);
            }
        }
    }
}

impl Debugger for MockDebugger {
    fn stdin_redirect(&mut self, _path: &str) -> R2Result<()> {
        Ok(())
    }

    fn reopen(&mut self) -> R2Result<()> {
        self.alive = true;
        Ok(())
    }

    fn breakpoint(&mut self, _address: &str) -> R2Result<()> {
        Ok(())
    }

    fn cont(&mut self) -> R2Result<()> {
        let input = self.current_input();
        if self.hang_inputs.contains(&input) {
            std::thread::sleep(Duration::from_millis(400));
        }
        if self.dead_inputs.contains(&input) {
            self.alive = false;
            return Ok(());
        }
        let result = (self.compute)(input);
        self.store_output(result);
        Ok(())
    }

    fn command(&mut self, cmd: &str) -> R2Result<String> {
        self.command_log.lock().unwrap().push(cmd.to_owned());
        Ok(String::new())
    }

    fn set_register(&mut self, reg: &str, value: u64) -> R2Result<()> {
        self.regs.insert(reg.to_owned(), value);
        Ok(())
    }

    fn get_register(&mut self, reg: &str) -> R2Result<u64> {
        if !self.alive {
            return Err("no running process".to_owned());
        }
        if reg == "PC" {
            return Ok(0x1000);
        }
        self.regs
            .get(reg)
            .copied()
            .ok_or_else(|| format!("unknown register {}", reg))
    }

    fn set_instruction_pointer(&mut self, _address: &str) -> R2Result<()> {
        Ok(())
    }

    fn write_zeros(&mut self, _length: usize, address: &str) -> R2Result<()> {
        self.mem.insert(address.to_owned(), 0);
        Ok(())
    }

    fn write_hex(&mut self, hex: &str, address: &str) -> R2Result<()> {
        let value = u64::from_str_radix(hex, 16).map_err(|e| e.to_string())?;
        self.mem.insert(address.to_owned(), value);
        Ok(())
    }

    fn read_value(&mut self, length: usize, address: &str) -> R2Result<u64> {
        if !self.alive {
            return Err("no running process".to_owned());
        }
        let value = self
            .mem
            .get(address)
            .copied()
            .ok_or_else(|| format!("cannot read {}", address))?;
        let mask = if length >= 8 {
            u64::MAX
        } else {
            (1u64 << (8 * length)) - 1
        };
        Ok(value & mask)
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn register_config() -> SessionConfig {
    SessionConfig {
        target: "target/fake".to_owned(),
        start: "0x1149".to_owned(),
        stop: "0x1163".to_owned(),
        input: Location::Register("eax".to_owned()),
        output: Location::Register("eax".to_owned()),
        input_width: 1,
        output_width: 1,
        commands: vec![],
        stdin_file: None,
        jump: false,
    }
}

fn memory_config(width: usize) -> SessionConfig {
    SessionConfig {
        input: Location::Memory("rbp-0x8".to_owned()),
        output: Location::Memory("rbp-0x8".to_owned()),
        input_width: width,
        output_width: if width > 1 { 2 } else { 1 },
        ..register_config()
    }
}

fn sorted_points(outcome: &SweepOutcome) -> Vec<ResultPoint> {
    let mut points = outcome.points.clone();
    points.sort_unstable();
    points
}

#[test]
fn range_expansion() {
    let spec = SweepSpec::new(0, 101, 5).unwrap();
    let values: Vec<u64> = spec.values().collect();
    assert_eq!(values.len(), 21);
    assert_eq!(values[0], 0);
    assert!(values.iter().all(|v| *v < 101));
    assert!(values.windows(2).all(|w| w[1] - w[0] == 5));
    assert_eq!(spec.len(), values.len());
    // restartable
    assert_eq!(spec.values().count(), 21);
}

#[test]
fn range_parse_forms() {
    let spec = SweepSpec::parse("[0,101,5]").unwrap();
    assert_eq!((spec.lower, spec.upper, spec.step), (0, 101, 5));
    assert_eq!(SweepSpec::parse("[3,9]").unwrap().step, 1);
    assert_eq!(SweepSpec::parse("[ 1 , 10 , 2 ]").unwrap().len(), 5);
}

#[test]
fn range_rejects_bad_specs() {
    assert!(SweepSpec::parse("[5,5]").is_err());
    assert!(SweepSpec::parse("[9,3]").is_err());
    assert!(SweepSpec::parse("[0,10,0]").is_err());
    assert!(SweepSpec::parse("[0,10,-2]").is_err());
    assert!(SweepSpec::parse("0,10").is_err());
    assert!(SweepSpec::parse("[a,b]").is_err());
    assert!(SweepSpec::parse("[0,10,1,1]").is_err());
    assert!(SweepSpec::new(10, 3, 1).is_err());
    assert!(SweepSpec::new(0, 10, 0).is_err());
}

#[test]
fn location_forms() {
    assert_eq!(
        Location::parse("eax").unwrap(),
        Location::Register("eax".to_owned())
    );
    assert_eq!(
        Location::parse("m[rbp-0x8]").unwrap(),
        Location::Memory("rbp-0x8".to_owned())
    );
    assert!(Location::parse("m[rbp-0x8").is_err());
    assert_eq!(Location::parse("m[rbp-0x8]").unwrap().to_string(), "m[rbp-0x8]");
}

#[test]
fn hex_parsing() {
    assert_eq!(parse_hex("0x1f\n"), Ok(31));
    assert_eq!(parse_hex("0x00000005"), Ok(5));
    assert_eq!(parse_hex("ff"), Ok(255));
    assert!(parse_hex("").is_err());
    assert!(parse_hex("oops").is_err());
}

#[test]
fn driver_doubles_register() {
    let config = register_config();
    let mock = MockDebugger::new(&config, |v| v * 2);
    let closes = mock.closes.clone();

    let spec = SweepSpec::new(0, 10, 2).unwrap();
    let outcome = sweep(&spec, &config, 1, None, move || Ok(mock.clone()));

    let expected: Vec<ResultPoint> = [(0, 0), (2, 4), (4, 8), (6, 12), (8, 16)]
        .iter()
        .map(|&(input, output)| ResultPoint { input, output })
        .collect();
    assert_eq!(sorted_points(&outcome), expected);
    assert!(outcome.faults.is_empty());
    // every session was closed
    assert_eq!(closes.load(Ordering::SeqCst), 5);
}

#[test]
fn jump_mode_produces_same_points() {
    let mut config = register_config();
    config.jump = true;
    let mock = MockDebugger::new(&config, |v| v + 3);

    let spec = SweepSpec::new(0, 4, 1).unwrap();
    let outcome = sweep(&spec, &config, 2, None, move || Ok(mock.clone()));

    let points = sorted_points(&outcome);
    assert_eq!(points.len(), 4);
    assert!(points.iter().all(|p| p.output == p.input + 3));
}

#[test]
fn worker_count_does_not_change_results() {
    let config = register_config();
    let spec = SweepSpec::new(0, 32, 1).unwrap();

    let single = MockDebugger::new(&config, |v| v ^ 0x5a);
    let serial = sweep(&spec, &config, 1, None, move || Ok(single.clone()));

    let pooled = MockDebugger::new(&config, |v| v ^ 0x5a);
    let parallel = sweep(&spec, &config, 8, None, move || Ok(pooled.clone()));

    assert_eq!(sorted_points(&serial), sorted_points(&parallel));
    assert_eq!(serial.points.len(), 32);
}

#[test]
fn per_value_faults_are_isolated() {
    let config = register_config();
    let mock = MockDebugger::new(&config, |v| v * 2).with_dead(&[5]);

    let spec = SweepSpec::new(0, 10, 1).unwrap();
    let outcome = sweep(&spec, &config, 4, None, move || Ok(mock.clone()));

    assert_eq!(outcome.points.len(), 9);
    assert!(outcome.points.iter().all(|p| p.input != 5));
    assert_eq!(outcome.faults.len(), 1);
    assert_eq!(outcome.faults[0].input, 5);
    assert!(matches!(
        outcome.faults[0].error,
        DriverError::BreakpointNotReached { .. }
    ));
}

#[test]
fn memory_width_too_small_is_an_error() {
    let config = memory_config(1);
    let mock = MockDebugger::new(&config, |v| v);

    let spec = SweepSpec::new(250, 260, 1).unwrap();
    let outcome = sweep(&spec, &config, 2, None, move || Ok(mock.clone()));

    // 250..=255 fit in one byte, 256..=259 do not
    assert_eq!(outcome.points.len(), 6);
    assert_eq!(outcome.faults.len(), 4);
    assert!(outcome.faults.iter().all(|f| f.input >= 256));
    assert!(outcome
        .faults
        .iter()
        .all(|f| matches!(f.error, DriverError::ValueTooWide { width: 1, .. })));
}

#[test]
fn memory_round_trip_with_wide_enough_input() {
    let config = memory_config(2);
    let mock = MockDebugger::new(&config, |v| v);

    let spec = SweepSpec::new(250, 260, 1).unwrap();
    let outcome = sweep(&spec, &config, 2, None, move || Ok(mock.clone()));

    assert!(outcome.faults.is_empty());
    let points = sorted_points(&outcome);
    assert_eq!(points.len(), 10);
    assert!(points.iter().all(|p| p.output == p.input));
}

#[test]
fn pre_commands_run_in_order() {
    let mut config = register_config();
    config.commands = vec!["dr ebx = 7".to_owned(), "dso".to_owned()];
    let mock = MockDebugger::new(&config, |v| v);
    let log = mock.command_log.clone();

    let spec = SweepSpec::new(1, 2, 1).unwrap();
    let outcome = sweep(&spec, &config, 1, None, move || Ok(mock.clone()));

    assert_eq!(outcome.points.len(), 1);
    assert_eq!(*log.lock().unwrap(), vec!["dr ebx = 7", "dso"]);
}

#[test]
fn timeout_abandons_stuck_value() {
    let config = register_config();
    let mock = MockDebugger::new(&config, |v| v * 2).with_hang(&[3]);

    let spec = SweepSpec::new(0, 5, 1).unwrap();
    let outcome = sweep(
        &spec,
        &config,
        2,
        Some(Duration::from_millis(50)),
        move || Ok(mock.clone()),
    );

    assert_eq!(outcome.points.len(), 4);
    assert!(outcome.points.iter().all(|p| p.input != 3));
    assert_eq!(outcome.faults.len(), 1);
    assert_eq!(outcome.faults[0].input, 3);
    assert!(matches!(
        outcome.faults[0].error,
        DriverError::BreakpointNotReached { .. }
    ));
}

#[test]
fn session_open_failure_is_a_fault() {
    let config = register_config();
    let spec = SweepSpec::new(0, 3, 1).unwrap();
    let outcome = sweep(&spec, &config, 1, None, || {
        Err::<MockDebugger, _>(DriverError::SessionOpen {
            path: "target/fake".to_owned(),
            reason: "no such file".to_owned(),
        })
    });

    assert!(outcome.points.is_empty());
    assert_eq!(outcome.faults.len(), 3);
}

#[test]
fn driver_reports_dead_target_before_start() {
    // the target exits before the first breakpoint is ever reached
    let config = register_config();
    let mock = MockDebugger::new(&config, |v| v).with_dead(&[0]);

    let mut session = Session::new(mock);
    let result = session.run(&config, 7);
    assert!(matches!(
        result,
        Err(DriverError::BreakpointNotReached { .. })
    ));
}
