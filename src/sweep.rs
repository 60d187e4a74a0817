use crate::errors::DriverError;
use crate::range::SweepSpec;
use crate::session::{Debugger, ResultPoint, Session, SessionConfig};

use log::{debug, info, warn};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// A value whose session failed. The rest of the sweep is unaffected.
#[derive(Debug, Clone)]
pub struct SweepFault {
    pub input: u64,
    pub error: DriverError,
}

/// Everything a finished sweep produced. Points arrive in completion
/// order, the reporter sorts them by input before display.
#[derive(Debug)]
pub struct SweepOutcome {
    pub points: Vec<ResultPoint>,
    pub faults: Vec<SweepFault>,
}

/// Run one debug session per value in the range across a fixed pool
/// of worker threads. Each value is attempted exactly once. Blocks
/// until every dispatched value has produced a point or a fault.
///
/// `factory` opens one fresh debugger per value, so at most `threads`
/// sessions are alive at a time. With a `timeout` a session that
/// never reaches its breakpoint is reported and abandoned instead of
/// stalling its pool slot forever.
pub fn sweep<D, F>(
    spec: &SweepSpec,
    config: &SessionConfig,
    threads: usize,
    timeout: Option<Duration>,
    factory: F,
) -> SweepOutcome
where
    D: Debugger + Send + 'static,
    F: Fn() -> Result<D, DriverError> + Send + Sync + 'static,
{
    let mut values: Vec<u64> = spec.values().collect();
    values.reverse(); // workers pop from the back

    let queue = Arc::new(Mutex::new(values));
    let points = Arc::new(Mutex::new(Vec::with_capacity(spec.len())));
    let faults: Arc<Mutex<Vec<SweepFault>>> = Arc::new(Mutex::new(Vec::new()));
    let config = Arc::new(config.clone());
    let factory = Arc::new(factory);

    let threads = threads.max(1);
    info!("sweeping {} values across {} threads", spec.len(), threads);

    let mut handles = Vec::with_capacity(threads);
    for _ in 0..threads {
        let queue = queue.clone();
        let points = points.clone();
        let faults = faults.clone();
        let config = config.clone();
        let factory = factory.clone();

        handles.push(thread::spawn(move || loop {
            let value = match queue.lock().unwrap().pop() {
                Some(value) => value,
                None => break,
            };

            match run_with_timeout(&factory, &config, value, timeout) {
                Ok(point) => {
                    debug!("input {} -> output {}", point.input, point.output);
                    points.lock().unwrap().push(point);
                }
                Err(error) => {
                    warn!("skipping input {}: {}", value, error);
                    faults.lock().unwrap().push(SweepFault { input: value, error });
                }
            }
        }));
    }

    while let Some(handle) = handles.pop() {
        handle.join().unwrap();
    }

    let points = std::mem::take(&mut *points.lock().unwrap());
    let faults = std::mem::take(&mut *faults.lock().unwrap());
    SweepOutcome { points, faults }
}

fn run_one<D, F>(factory: &F, config: &SessionConfig, value: u64) -> Result<ResultPoint, DriverError>
where
    D: Debugger,
    F: Fn() -> Result<D, DriverError>,
{
    let mut session = Session::new(factory()?);
    session.run(config, value)
}

fn run_with_timeout<D, F>(
    factory: &Arc<F>,
    config: &Arc<SessionConfig>,
    value: u64,
    timeout: Option<Duration>,
) -> Result<ResultPoint, DriverError>
where
    D: Debugger + Send + 'static,
    F: Fn() -> Result<D, DriverError> + Send + Sync + 'static,
{
    let limit = match timeout {
        Some(limit) => limit,
        None => return run_one(factory.as_ref(), config, value),
    };

    let (sender, receiver) = mpsc::channel();
    let factory = factory.clone();
    let worker_config = config.clone();

    thread::spawn(move || {
        let _ = sender.send(run_one(factory.as_ref(), &worker_config, value));
    });

    match receiver.recv_timeout(limit) {
        Ok(result) => result,
        Err(_) => {
            warn!(
                "input {} still blocked after {:?}, abandoning its session",
                value, limit
            );
            Err(DriverError::BreakpointNotReached {
                address: config.stop.clone(),
            })
        }
    }
}
