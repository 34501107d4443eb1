use std::time::{Duration, Instant};

use log::{debug, info, trace};

use crate::communication::Msg;
use crate::core::subsystem::Subsystem;
use crate::core::tree::{SubsystemId, SubsystemTree};
use crate::error::CadenceResult;
use crate::scheduling::Phase;

/// Cycle counters and timing for one manager.
#[derive(Debug, Clone, Default)]
pub struct CycleMetrics {
    pub cycles: u64,
    pub last_cycle: Duration,
    pub min_cycle: Duration,
    pub max_cycle: Duration,
    pub total_runtime: Duration,
}

impl CycleMetrics {
    fn record(&mut self, elapsed: Duration) {
        self.cycles += 1;
        self.last_cycle = elapsed;
        if self.cycles == 1 || elapsed < self.min_cycle {
            self.min_cycle = elapsed;
        }
        if elapsed > self.max_cycle {
            self.max_cycle = elapsed;
        }
        self.total_runtime += elapsed;
    }

    pub fn avg_cycle(&self) -> Duration {
        if self.cycles == 0 {
            Duration::ZERO
        } else {
            self.total_runtime / self.cycles as u32
        }
    }
}

/// Central orchestrator: owns the verified subsystem tree and drives
/// every subsystem through the phased update protocol.
///
/// Construction consumes the pre-wired tree, runs the one-time
/// structural verification and flattens the hierarchy; a mis-wired
/// tree never reaches its first cycle. After that the only entry
/// points are [`init`](Manager::init) and [`cycle`](Manager::cycle):
/// the host calls `cycle()` from its own periodic loop, once per
/// control tick.
///
/// The protocol per cycle, phases strictly sequential:
///
/// 1. basic data update: bottom-up per branch
/// 2. data request send: all subsystems, arbitrary order
/// 3. data request receive: full inbox drain, then answer delivery
/// 4. logic update: all subsystems, arbitrary order
/// 5. action request send: top-down cascade
/// 6. action request receive: drain up to the cascade watermark,
///    then answer delivery; later arrivals wait one cycle
/// 7. control model update, then control publish: two complete
///    passes, no publish before every model has updated
/// 8. cleanup
pub struct Manager {
    tree: SubsystemTree,
    top: Vec<SubsystemId>,
    all: Vec<SubsystemId>,
    name: String,
    dry_run: bool,
    metrics: CycleMetrics,
}

impl Manager {
    /// Verify the tree and build the manager. Fails with a structural
    /// error if any node's recorded owner disagrees with the
    /// registered hierarchy.
    pub fn new(tree: SubsystemTree) -> CadenceResult<Self> {
        tree.verify()?;
        let (top, all) = tree.flatten();
        info!(
            "manager verified {} subsystems ({} top-level)",
            all.len(),
            top.len()
        );
        Ok(Manager {
            tree,
            top,
            all,
            name: "manager".to_string(),
            dry_run: false,
            metrics: CycleMetrics::default(),
        })
    }

    /// Set the manager name used in logs (builder pattern).
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Skip the control-publish pass each cycle. Everything else runs
    /// unchanged, so a robot can be exercised without actuating
    /// hardware.
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn subsystem_count(&self) -> usize {
        self.all.len()
    }

    pub fn top_level_count(&self) -> usize {
        self.top.len()
    }

    pub fn metrics(&self) -> &CycleMetrics {
        &self.metrics
    }

    /// Read-only typed access to a subsystem, for the embedding host.
    pub fn peek<T: Subsystem>(&self, id: SubsystemId) -> Option<&T> {
        self.tree.peek(id)
    }

    /// Inject a request from outside the tree (operator input, device
    /// drivers). Call between cycles; the message surfaces in the next
    /// receive phase matching its kind.
    pub fn post_request(&mut self, target: SubsystemId, msg: &Msg) -> CadenceResult<()> {
        self.tree.post_request(target, msg)
    }

    /// Device bring-up extension point (cameras, sensor attach).
    /// Currently nothing to do.
    pub fn init(&mut self) {
        debug!("[{}] init", self.name);
    }

    /// Run exactly one full 8-phase cycle.
    ///
    /// A hook fault aborts the cycle immediately: skipping a subsystem
    /// mid-phase would break the drain-once and phase-barrier
    /// guarantees, so there is no partial recovery. The host decides
    /// whether to log and retry or to stop.
    pub fn cycle(&mut self) -> CadenceResult<()> {
        let started = Instant::now();
        trace!("[{}] cycle {} begin", self.name, self.metrics.cycles + 1);

        trace!("[{}] {}", self.name, Phase::BasicData);
        for &id in &self.top {
            self.tree.run_basic_data(id)?;
        }

        trace!("[{}] {}", self.name, Phase::DataRequestSend);
        for &id in &self.all {
            self.tree.run_send_data(id)?;
        }

        trace!("[{}] {}", self.name, Phase::DataRequestReceive);
        for &id in &self.all {
            self.tree.drain_data_requests(id)?;
        }
        for &id in &self.all {
            self.tree.drain_data_answers(id)?;
        }

        trace!("[{}] {}", self.name, Phase::LogicUpdate);
        for &id in &self.all {
            self.tree.run_logic(id)?;
        }

        trace!("[{}] {}", self.name, Phase::ActionRequestSend);
        for &id in &self.top {
            self.tree.run_action_cascade(id)?;
        }

        trace!("[{}] {}", self.name, Phase::ActionRequestReceive);
        for &id in &self.all {
            self.tree.drain_action_requests(id)?;
        }
        for &id in &self.all {
            self.tree.drain_action_answers(id)?;
        }

        trace!("[{}] {}", self.name, Phase::ControlModelUpdate);
        for &id in &self.all {
            self.tree.run_control_models(id)?;
        }
        if self.dry_run {
            trace!("[{}] {} skipped (dry run)", self.name, Phase::ControlPublish);
        } else {
            trace!("[{}] {}", self.name, Phase::ControlPublish);
            for &id in &self.all {
                self.tree.run_publish(id)?;
            }
        }

        trace!("[{}] {}", self.name, Phase::Cleanup);
        for &id in &self.all {
            self.tree.run_cleanup(id)?;
        }

        self.metrics.record(started.elapsed());
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn tree(&self) -> &SubsystemTree {
        &self.tree
    }
}
