use r2pipe::{R2Pipe, R2PipeSpawnOptions};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

pub type R2Result<T> = Result<T, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreInfo {
    pub file: String,
    pub size: u64,
    pub mode: String,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinInfo {
    pub arch: String,
    pub bits: u64,
    pub endian: String,
    pub os: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Information {
    pub core: CoreInfo,

    #[serde(default)]
    pub bin: Option<BinInfo>,
}

/// Handle to one r2 process debugging one target executable. One
/// method per debugger operation the sweep needs, each a single
/// synchronous command over the pipe.
#[derive(Clone)]
pub struct R2Api {
    pub r2p: Arc<Mutex<R2Pipe>>,
    pub info: Option<Information>,
}

// SAFETY: R2Pipe's trait object is missing a Send bound, but the only
// pipe ever constructed here comes from R2Pipe::spawn, which holds the
// child process's stdin/stdout handles — both Send. The Mutex
// serializes all access.
unsafe impl Send for R2Api {}
unsafe impl Sync for R2Api {}

impl R2Api {
    /// Spawn r2 against the target in debug mode with analysis.
    pub fn new(filename: &str) -> R2Result<R2Api> {
        let options = R2PipeSpawnOptions {
            exepath: "r2".to_owned(),
            args: vec!["-d", "-A", "-2"],
        };

        let r2p = R2Pipe::spawn(filename, Some(options)).map_err(|e| e.to_string())?;

        let mut r2api = R2Api {
            r2p: Arc::new(Mutex::new(r2p)),
            info: None,
        };

        r2api.get_info()?;
        Ok(r2api)
    }

    pub fn cmd(&mut self, cmd: &str) -> R2Result<String> {
        self.r2p.lock().unwrap().cmd(cmd).map_err(|e| e.to_string())
    }

    pub fn get_info(&mut self) -> R2Result<Information> {
        if self.info.is_none() {
            let json = self.cmd("ij")?;
            self.info = Some(serde_json::from_str(json.as_str()).map_err(|e| e.to_string())?);
        }
        Ok(self.info.clone().unwrap())
    }

    /// Pointer width of the target if r2 could tell.
    pub fn bits(&self) -> Option<u64> {
        self.info.as_ref()?.bin.as_ref().map(|bin| bin.bits)
    }

    /// Make the debuggee read standard input from a file.
    pub fn stdin_redirect(&mut self, path: &str) -> R2Result<()> {
        self.cmd(format!("dor stdin={}", path).as_str()).map(|_| ())
    }

    /// Reopen the target under the debugger, back at the entry.
    pub fn reopen(&mut self) -> R2Result<()> {
        self.cmd("doo").map(|_| ())
    }

    pub fn breakpoint(&mut self, addr: &str) -> R2Result<()> {
        self.cmd(format!("db {}", addr).as_str()).map(|_| ())
    }

    pub fn cont(&mut self) -> R2Result<()> {
        self.cmd("dc").map(|_| ())
    }

    pub fn set_register(&mut self, reg: &str, value: u64) -> R2Result<()> {
        self.cmd(format!("dr {} = {}", reg, value).as_str()).map(|_| ())
    }

    pub fn get_register(&mut self, reg: &str) -> R2Result<u64> {
        let val = self.cmd(format!("dr {}", reg).as_str())?;
        parse_hex(val.as_str())
    }

    /// Point execution at an address without running anything before
    /// it. When the pointer width is unknown both candidate registers
    /// are set, r2 ignores the one the target does not have.
    pub fn set_instruction_pointer(&mut self, addr: &str) -> R2Result<()> {
        match self.bits() {
            Some(64) => self.cmd(format!("dr rip = {}", addr).as_str()).map(|_| ()),
            Some(32) => self.cmd(format!("dr eip = {}", addr).as_str()).map(|_| ()),
            _ => {
                let _ = self.cmd(format!("dr rip = {}", addr).as_str());
                self.cmd(format!("dr eip = {}", addr).as_str()).map(|_| ())
            }
        }
    }

    pub fn write_zeros(&mut self, length: usize, addr: &str) -> R2Result<()> {
        self.cmd(format!("w0 {} @ {}", length, addr).as_str()).map(|_| ())
    }

    /// Write a big endian hex byte string at an address expression.
    pub fn write_hex(&mut self, hex: &str, addr: &str) -> R2Result<()> {
        self.cmd(format!("wB 0x{} @ {}", hex, addr).as_str()).map(|_| ())
    }

    /// Read `length` bytes at an address expression as an unsigned
    /// value. Length must be 1, 2, 4 or 8.
    pub fn read_value(&mut self, length: usize, addr: &str) -> R2Result<u64> {
        let val = self.cmd(format!("pv{} @ {}", length, addr).as_str())?;
        parse_hex(val.as_str())
    }

    pub fn close(&mut self) {
        self.r2p.lock().unwrap().close();
    }
}

/// Parse r2's hex output, `0x1f\n` style, into a value.
pub fn parse_hex(raw: &str) -> R2Result<u64> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    u64::from_str_radix(digits, 16).map_err(|_| format!("expected a hex value, got {:?}", raw))
}
