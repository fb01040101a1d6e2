//! In-memory link and scripted keyboard for loop tests.

use crate::domain::models::{BatteryLevel, KeySnapshot};
use crate::domain::vehicle::DriveCommand;
use crate::error::{RemoteError, Result};
use crate::infrastructure::bluetooth::VehicleLink;
use crate::infrastructure::keyboard::KeySource;
use async_trait::async_trait;
use std::cell::Cell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Records writes and serves scripted battery reads.
#[derive(Default)]
pub struct MockLink {
    connected: AtomicBool,
    fail_writes: bool,
    writes: Mutex<Vec<DriveCommand>>,
    /// `None` entries fail; an empty script reads 50%.
    battery: Mutex<VecDeque<Option<u8>>>,
    battery_reads: AtomicUsize,
    disconnects: AtomicUsize,
}

impl MockLink {
    pub fn connected() -> Self {
        Self {
            connected: AtomicBool::new(true),
            ..Default::default()
        }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn with_battery(self, script: Vec<Option<u8>>) -> Self {
        *self.battery.lock().unwrap() = script.into();
        self
    }

    pub fn writes(&self) -> Vec<DriveCommand> {
        self.writes.lock().unwrap().clone()
    }

    pub fn battery_reads(&self) -> usize {
        self.battery_reads.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VehicleLink for MockLink {
    async fn write_command(&self, command: &DriveCommand) -> Result<()> {
        if self.fail_writes {
            return Err(RemoteError::Write("mock write failure".to_string()));
        }
        self.writes.lock().unwrap().push(*command);
        Ok(())
    }

    async fn read_battery(&self) -> Result<BatteryLevel> {
        self.battery_reads.fetch_add(1, Ordering::SeqCst);
        match self.battery.lock().unwrap().pop_front() {
            Some(Some(percent)) => Ok(BatteryLevel(percent)),
            Some(None) => Err(RemoteError::Read("mock read failure".to_string())),
            None => Ok(BatteryLevel(50)),
        }
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Plays back a fixed list of snapshots, then repeats `after` forever.
pub struct ScriptedKeys {
    script: VecDeque<KeySnapshot>,
    after: KeySnapshot,
    samples: Rc<Cell<usize>>,
}

impl ScriptedKeys {
    pub fn new(script: Vec<KeySnapshot>) -> Self {
        Self {
            script: script.into(),
            after: KeySnapshot::default(),
            samples: Rc::new(Cell::new(0)),
        }
    }

    pub fn repeating(snapshot: KeySnapshot) -> Self {
        Self {
            after: snapshot,
            ..Self::new(Vec::new())
        }
    }

    /// Shared counter of how many times the loop sampled.
    pub fn samples(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.samples)
    }
}

impl KeySource for ScriptedKeys {
    fn snapshot(&mut self) -> Result<KeySnapshot> {
        self.samples.set(self.samples.get() + 1);
        Ok(self.script.pop_front().unwrap_or(self.after))
    }
}

/// Collects formatted tracing output for the current thread.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let capture = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || capture.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
