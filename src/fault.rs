//! Fault injection (debug_flaky)
//!
//! The engine asks its injector once per locally accepted Set or BulkSet,
//! after the record is durable and before it is applied. A `true` answer
//! skips the in-memory apply, leaving the WAL ahead of the snapshot until the
//! next recovery replays it. Deletes, reads and replicated records are never
//! subject to injection.
//!
//! Separately, the WAL file is wrapped in a [`FaultyWalFile`] that asks the
//! injector before every data fsync, so tests can make an append fail the
//! way a full or failing disk would.

use std::fs::File;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{DriftError, Result};
use crate::wal::WalFile;

/// Decides whether an apply step is skipped
pub trait FaultInjector: Send + Sync {
    fn skip_apply(&self) -> bool;

    /// Whether the next WAL data fsync fails. Applies to every append,
    /// replicated ones included.
    fn fail_wal_sync(&self) -> bool {
        false
    }
}

/// WAL file whose data fsyncs fail when the injector says so
pub struct FaultyWalFile {
    file: File,
    faults: Arc<dyn FaultInjector>,
}

impl FaultyWalFile {
    pub fn new(file: File, faults: Arc<dyn FaultInjector>) -> Self {
        Self { file, faults }
    }
}

impl WalFile for FaultyWalFile {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        WalFile::write_all(&mut self.file, bytes)
    }

    fn sync_data(&mut self) -> io::Result<()> {
        if self.faults.fail_wal_sync() {
            return Err(io::Error::new(io::ErrorKind::Other, "injected WAL fsync failure"));
        }
        WalFile::sync_data(&mut self.file)
    }

    fn sync_all(&mut self) -> io::Result<()> {
        WalFile::sync_all(&mut self.file)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        WalFile::set_len(&mut self.file, len)
    }

    fn file_len(&self) -> io::Result<u64> {
        self.file.file_len()
    }
}

/// Never skips
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFaults;

impl FaultInjector for NoFaults {
    fn skip_apply(&self) -> bool {
        false
    }
}

/// Always gives the same answer
#[derive(Debug, Clone, Copy)]
pub struct FixedFaults(pub bool);

impl FaultInjector for FixedFaults {
    fn skip_apply(&self) -> bool {
        self.0
    }
}

/// Skips each apply independently with probability `p`
pub struct ProbabilisticFaults {
    probability: f64,
    rng: Mutex<StdRng>,
}

impl ProbabilisticFaults {
    pub fn new(probability: f64) -> Result<Self> {
        Self::build(probability, StdRng::from_entropy())
    }

    /// Deterministic sequence of draws, for reproducible tests
    pub fn with_seed(probability: f64, seed: u64) -> Result<Self> {
        Self::build(probability, StdRng::seed_from_u64(seed))
    }

    fn build(probability: f64, rng: StdRng) -> Result<Self> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(DriftError::Config(format!(
                "fault probability must be within [0, 1], got {}",
                probability
            )));
        }
        Ok(Self {
            probability,
            rng: Mutex::new(rng),
        })
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl FaultInjector for ProbabilisticFaults {
    fn skip_apply(&self) -> bool {
        if self.probability <= 0.0 {
            return false;
        }
        if self.probability >= 1.0 {
            return true;
        }
        self.rng.lock().gen_bool(self.probability)
    }
}
