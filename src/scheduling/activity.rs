use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{info, warn};

use crate::error::SimError;
use crate::scheduling::event::{PeriodicTraceSaveEvent, TraceLoadEvent};
use crate::simulation::Simulation;

/// A unit of setup/teardown work attached to a simulation run.
pub trait SimActivity {
    /// Seeds the activity's initial events. Called once from
    /// [Simulation::init].
    fn schedule_on(&mut self, sim: &mut Simulation) -> Result<(), SimError>;

    /// Releases resources held for the run. Called from [Simulation::end].
    fn cleanup(&mut self);
}

/// Streams a pre-recorded event trace into the simulation, in bounded
/// chunks driven by the queue's reload sentinel.
pub struct TraceLoadingActivity {
    path: PathBuf,
}

impl TraceLoadingActivity {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SimActivity for TraceLoadingActivity {
    fn schedule_on(&mut self, sim: &mut Simulation) -> Result<(), SimError> {
        info!("opening '{}' for trace loading", self.path.display());
        let input = BufReader::new(File::open(&self.path)?);
        let start = sim.clock().start();
        sim.add_event(Box::new(TraceLoadEvent::new(start, Box::new(input))));
        Ok(())
    }

    fn cleanup(&mut self) {
        // the reader lives inside the reload-event chain and is dropped
        // with the queue
    }
}

/// Periodically snapshots every agent's location into a trace file.
pub struct PeriodicTraceSavingActivity {
    path: PathBuf,
    /// Snapshot period in ms.
    period: i64,
    output: Option<Rc<RefCell<BufWriter<File>>>>,
}

impl PeriodicTraceSavingActivity {
    pub fn new(path: impl Into<PathBuf>, period: i64) -> Self {
        Self {
            path: path.into(),
            period,
            output: None,
        }
    }
}

impl SimActivity for PeriodicTraceSavingActivity {
    fn schedule_on(&mut self, sim: &mut Simulation) -> Result<(), SimError> {
        info!("opening '{}' for trace writing", self.path.display());
        let output = Rc::new(RefCell::new(BufWriter::new(File::create(&self.path)?)));
        self.output = Some(output.clone());
        let start = sim.clock().start();
        sim.add_event(Box::new(PeriodicTraceSaveEvent::new(
            start,
            self.period,
            output,
        )));
        Ok(())
    }

    fn cleanup(&mut self) {
        if let Some(output) = self.output.take() {
            if let Err(e) = output.borrow_mut().flush() {
                warn!("failed to flush trace '{}': {}", self.path.display(), e);
            }
        }
    }
}

/// Produces a complete trace file, typically by running mobility or query
/// models over a throwaway simulation in bounded time stages.
pub trait TraceGenerator {
    fn generate_trace(&mut self, path: &Path) -> Result<(), SimError>;
}

/// Runs a collaborator-supplied [TraceGenerator] before the main run,
/// unless the trace already exists and overwriting is not allowed.
pub struct TraceGenerationActivity {
    path: PathBuf,
    generator: Option<Box<dyn TraceGenerator>>,
    overwrite_allowed: bool,
}

impl TraceGenerationActivity {
    pub fn new(
        path: impl Into<PathBuf>,
        generator: Box<dyn TraceGenerator>,
        overwrite_allowed: bool,
    ) -> Self {
        Self {
            path: path.into(),
            generator: Some(generator),
            overwrite_allowed,
        }
    }
}

impl SimActivity for TraceGenerationActivity {
    fn schedule_on(&mut self, _sim: &mut Simulation) -> Result<(), SimError> {
        let Some(mut generator) = self.generator.take() else {
            return Ok(());
        };
        let nonempty = fs::metadata(&self.path).map_or(false, |meta| meta.len() > 0);
        if !self.overwrite_allowed && nonempty {
            info!("trace '{}' already exists, not regenerating", self.path.display());
            return Ok(());
        }
        info!("generating trace '{}'", self.path.display());
        generator.generate_trace(&self.path)
    }

    fn cleanup(&mut self) {}
}
