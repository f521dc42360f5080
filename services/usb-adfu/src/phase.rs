use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::{logging::*, Error};

/// Install phases exchanged with the userspace installer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdfuPhase {
    Start,
    Flashing,
    FlashDone,
    WritingPhy,
    WriteDone,
    Formatting,
    FormatDone,
    Finished,
    FinishedOk,
    Failed,
}

impl AdfuPhase {
    pub fn name(&self) -> &'static str {
        match self {
            AdfuPhase::Start => "start",
            AdfuPhase::Flashing => "flashing",
            AdfuPhase::FlashDone => "flash-done",
            AdfuPhase::WritingPhy => "writing-phy",
            AdfuPhase::WriteDone => "write-done",
            AdfuPhase::Formatting => "formatting",
            AdfuPhase::FormatDone => "format-done",
            AdfuPhase::Finished => "finished",
            AdfuPhase::FinishedOk => "finished-ok",
            AdfuPhase::Failed => "failed",
        }
    }

    pub fn from_name(name: &str) -> Option<AdfuPhase> {
        Some(match name.trim() {
            "start" => AdfuPhase::Start,
            "flashing" => AdfuPhase::Flashing,
            "flash-done" => AdfuPhase::FlashDone,
            "writing-phy" => AdfuPhase::WritingPhy,
            "write-done" => AdfuPhase::WriteDone,
            "formatting" => AdfuPhase::Formatting,
            "format-done" => AdfuPhase::FormatDone,
            "finished" => AdfuPhase::Finished,
            "finished-ok" => AdfuPhase::FinishedOk,
            "failed" => AdfuPhase::Failed,
            _ => return None,
        })
    }

    /// Position in the install run. Writing and formatting partitions is one
    /// step, so those phases may alternate freely.
    fn rank(&self) -> u8 {
        match self {
            AdfuPhase::Start => 0,
            AdfuPhase::Flashing => 1,
            AdfuPhase::FlashDone => 2,
            AdfuPhase::WritingPhy | AdfuPhase::Formatting | AdfuPhase::FormatDone => 3,
            AdfuPhase::WriteDone => 4,
            AdfuPhase::Finished => 5,
            AdfuPhase::FinishedOk => 6,
            AdfuPhase::Failed => 7,
        }
    }
}

/// The text channel shared with the userspace installer. It holds one phase
/// name at a time; either side may overwrite it.
pub trait PhaseChannel: Send {
    fn read_phase(&mut self) -> io::Result<String>;
    fn write_phase(&mut self, name: &str) -> io::Result<()>;
}

/// Phase channel kept in a small file
pub struct FilePhaseChannel {
    path: PathBuf,
}

impl FilePhaseChannel {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        FilePhaseChannel { path: path.into() }
    }
}

impl PhaseChannel for FilePhaseChannel {
    fn read_phase(&mut self) -> io::Result<String> {
        Ok(fs::read_to_string(&self.path)?.trim().to_string())
    }

    fn write_phase(&mut self, name: &str) -> io::Result<()> {
        fs::write(&self.path, format!("{}\n", name))
    }
}

/// In-process phase channel; clones share the same slot
#[derive(Clone, Default)]
pub struct MemoryPhaseChannel {
    phase: Arc<Mutex<String>>,
}

impl MemoryPhaseChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> String {
        self.phase.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl PhaseChannel for MemoryPhaseChannel {
    fn read_phase(&mut self) -> io::Result<String> {
        Ok(self.current())
    }

    fn write_phase(&mut self, name: &str) -> io::Result<()> {
        let mut phase =
            self.phase.lock().map_err(|_| io::Error::new(io::ErrorKind::Other, "phase lock poisoned"))?;
        *phase = name.to_string();
        Ok(())
    }
}

/// Our side of the phase exchange. Keeps the phase monotonic within one
/// install run: a step backwards is logged and dropped.
pub(crate) struct PhaseTracker {
    channel: Box<dyn PhaseChannel>,
    current: AdfuPhase,
}

impl PhaseTracker {
    pub fn new(channel: Box<dyn PhaseChannel>) -> Self {
        PhaseTracker { channel, current: AdfuPhase::Start }
    }

    pub fn current(&self) -> AdfuPhase {
        self.current
    }

    fn accepts(&self, next: AdfuPhase) -> bool {
        if self.current == AdfuPhase::Failed {
            return next == AdfuPhase::Failed;
        }
        next.rank() >= self.current.rank()
    }

    /// Start a new install run
    pub fn restart(&mut self) {
        self.current = AdfuPhase::Start;
        if let Err(e) = self.channel.write_phase(AdfuPhase::Start.name()) {
            log::warn!("can't reset the phase channel: {}", e);
        }
    }

    /// Publish `next`. Channel failures are logged, they never fail the command
    /// that moved the install along.
    pub fn advance(&mut self, next: AdfuPhase) {
        if !self.accepts(next) {
            log::warn!("ignoring phase {} -> {}", self.current.name(), next.name());
            return;
        }
        trace_adfu!("PHASE> {} -> {}", self.current.name(), next.name());
        self.current = next;
        if let Err(e) = self.channel.write_phase(next.name()) {
            log::warn!("can't publish phase {}: {}", next.name(), e);
        }
    }

    /// One look at the channel: true once the installer has moved it to
    /// `expected`
    pub fn poll(&mut self, expected: AdfuPhase) -> Result<bool, Error> {
        let seen = self.channel.read_phase()?;
        match AdfuPhase::from_name(&seen) {
            Some(phase) if phase == expected => {
                if self.accepts(phase) {
                    trace_adfu!("PHASE> {} -> {} (installer)", self.current.name(), phase.name());
                    self.current = phase;
                }
                Ok(true)
            }
            Some(AdfuPhase::Failed) => {
                self.current = AdfuPhase::Failed;
                Err(Error::PhaseFailed)
            }
            _ => Ok(false),
        }
    }
}
