use std::time::Duration;

use log::{info, trace};

use cadence_core::{
    CadenceError, CadenceResult, Msg, ResponderContext, Subsystem, SubsystemContext, SubsystemId,
    SubsystemTree,
};

use crate::clock::Clock;
use crate::simple_timer::{SimpleTimer, SimpleTimerAction, SimpleTimerData};

/// Data vocabulary of [`Timer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerData {
    /// Cumulative running time (total minus paused), answered as a
    /// [`Duration`] payload.
    Cumulative,
}

/// Action vocabulary of [`Timer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    Pause,
    Start,
    /// Zero the cumulative time and restart both child counters.
    Reset,
    /// Log the cumulative time during the next publish phase.
    Report,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Running,
    Paused,
}

/// Pausable timer composite.
///
/// Owns two [`SimpleTimer`] children: one counting total time since
/// construction, one used to measure pause spans. Each cycle the timer
/// requests both elapsed readings through the data-request protocol,
/// keeps the message handles, and folds the answers into its state
/// machine during the logic update. Cumulative time is total elapsed
/// minus accumulated pause time.
///
/// `Reset` cascades: when the reset request comes from above during
/// the action cascade, the timer observes it among its pending
/// requests and forwards `SimpleTimerAction::Reset` to both children
/// within the same cycle.
pub struct Timer {
    total: Option<SubsystemId>,
    pause: Option<SubsystemId>,
    state: RunState,
    pending_cmd: Option<TimerAction>,
    /// A reset was forwarded to the children in this cycle's cascade.
    reset_forwarded: bool,
    /// A reset arrived outside the cascade and still needs forwarding.
    cascade_reset: bool,
    report_pending: bool,
    paused_acc: Duration,
    pause_mark: Duration,
    total_elapsed: Duration,
    pause_elapsed: Duration,
    cumulative: Duration,
    total_req: Option<Msg>,
    pause_req: Option<Msg>,
}

impl Timer {
    pub fn new() -> Self {
        Timer {
            total: None,
            pause: None,
            state: RunState::Running,
            pending_cmd: None,
            reset_forwarded: false,
            cascade_reset: false,
            report_pending: false,
            paused_acc: Duration::ZERO,
            pause_mark: Duration::ZERO,
            total_elapsed: Duration::ZERO,
            pause_elapsed: Duration::ZERO,
            cumulative: Duration::ZERO,
            total_req: None,
            pause_req: None,
        }
    }

    /// Wire the child counter ids. Called during tree construction.
    pub fn set_children(&mut self, total: SubsystemId, pause: SubsystemId) {
        self.total = Some(total);
        self.pause = Some(pause);
    }

    /// Insert a fully wired timer as a top-level subsystem.
    pub fn attach_top(
        tree: &mut SubsystemTree,
        total_clock: impl Clock + 'static,
        pause_clock: impl Clock + 'static,
    ) -> CadenceResult<SubsystemId> {
        Self::attach_inner(tree, None, total_clock, pause_clock)
    }

    /// Insert a fully wired timer under `owner`. The caller still
    /// registers the timer in the owner's child set.
    pub fn attach(
        tree: &mut SubsystemTree,
        owner: SubsystemId,
        total_clock: impl Clock + 'static,
        pause_clock: impl Clock + 'static,
    ) -> CadenceResult<SubsystemId> {
        Self::attach_inner(tree, Some(owner), total_clock, pause_clock)
    }

    fn attach_inner(
        tree: &mut SubsystemTree,
        owner: Option<SubsystemId>,
        total_clock: impl Clock + 'static,
        pause_clock: impl Clock + 'static,
    ) -> CadenceResult<SubsystemId> {
        let timer = match owner {
            Some(owner) => tree.insert(Timer::new(), owner),
            None => tree.insert_top(Timer::new()),
        };
        let total = tree.insert(SimpleTimer::new(total_clock), timer);
        let pause = tree.insert(SimpleTimer::new(pause_clock), timer);
        tree.add_child(timer, total)?;
        tree.add_child(timer, pause)?;
        tree.get_mut::<Timer>(timer)
            .ok_or(CadenceError::UnknownSubsystem(timer))?
            .set_children(total, pause);
        Ok(timer)
    }

    /// Cumulative running time as of this cycle's logic update.
    pub fn cumulative(&self) -> Duration {
        self.cumulative
    }

    pub fn is_paused(&self) -> bool {
        self.state == RunState::Paused
    }

    fn forward_reset(&mut self, ctx: &mut SubsystemContext<'_>) -> CadenceResult<()> {
        if let (Some(total), Some(pause)) = (self.total, self.pause) {
            ctx.send_request(total, &Msg::action(SimpleTimerAction::Reset))?;
            ctx.send_request(pause, &Msg::action(SimpleTimerAction::Reset))?;
            self.reset_forwarded = true;
        }
        Ok(())
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Subsystem for Timer {
    fn name(&self) -> &'static str {
        "timer"
    }

    fn send_data_request(&mut self, ctx: &mut SubsystemContext<'_>) -> CadenceResult<()> {
        if let (Some(total), Some(pause)) = (self.total, self.pause) {
            let total_req = Msg::data(SimpleTimerData::Elapsed);
            ctx.send_request(total, &total_req)?;
            self.total_req = Some(total_req);

            let pause_req = Msg::data(SimpleTimerData::Elapsed);
            ctx.send_request(pause, &pause_req)?;
            self.pause_req = Some(pause_req);
        }
        Ok(())
    }

    fn receive_data_request(
        &mut self,
        msg: &Msg,
        _ctx: &mut ResponderContext<'_>,
    ) -> CadenceResult<()> {
        if let Some(TimerData::Cumulative) = msg.identifier() {
            msg.set_payload(self.cumulative);
        }
        Ok(())
    }

    fn update_logic(&mut self) -> CadenceResult<()> {
        if let Some(msg) = self.total_req.take() {
            if let Some(elapsed) = msg.take_payload::<Duration>() {
                self.total_elapsed = elapsed;
            }
        }
        if let Some(msg) = self.pause_req.take() {
            if let Some(elapsed) = msg.take_payload::<Duration>() {
                self.pause_elapsed = elapsed;
            }
        }

        if let Some(cmd) = self.pending_cmd.take() {
            match (self.state, cmd) {
                (RunState::Running, TimerAction::Pause) => {
                    self.pause_mark = self.pause_elapsed;
                    self.state = RunState::Paused;
                    trace!("timer paused at {:?}", self.cumulative);
                }
                (RunState::Paused, TimerAction::Start) => {
                    self.paused_acc += self.pause_elapsed.saturating_sub(self.pause_mark);
                    self.state = RunState::Running;
                    trace!("timer resumed, paused total {:?}", self.paused_acc);
                }
                (_, TimerAction::Reset) => {
                    self.state = RunState::Running;
                    self.paused_acc = Duration::ZERO;
                    self.pause_mark = Duration::ZERO;
                    self.cumulative = Duration::ZERO;
                    // This cycle's readings may predate the children's
                    // own reset; report zero until fresh samples arrive.
                    return Ok(());
                }
                _ => {}
            }
        }

        if self.state == RunState::Running {
            self.cumulative = self.total_elapsed.saturating_sub(self.paused_acc);
        }
        Ok(())
    }

    fn send_action_request(&mut self, ctx: &mut SubsystemContext<'_>) -> CadenceResult<()> {
        let reset_from_above = ctx
            .pending_requests()
            .iter()
            .any(|msg| matches!(msg.identifier::<TimerAction>(), Some(TimerAction::Reset)));
        if self.cascade_reset || reset_from_above {
            self.forward_reset(ctx)?;
            self.cascade_reset = false;
        }
        Ok(())
    }

    fn receive_action_request(
        &mut self,
        msg: &Msg,
        _ctx: &mut ResponderContext<'_>,
    ) -> CadenceResult<()> {
        match msg.identifier::<TimerAction>() {
            Some(TimerAction::Reset) => {
                self.pending_cmd = Some(TimerAction::Reset);
                if !self.reset_forwarded {
                    // Arrived outside the cascade (externally posted or
                    // from below); the children get their reset next
                    // cycle.
                    self.cascade_reset = true;
                }
            }
            Some(TimerAction::Report) => self.report_pending = true,
            Some(cmd) => self.pending_cmd = Some(cmd),
            None => {}
        }
        Ok(())
    }

    fn publish_control(&mut self) -> CadenceResult<()> {
        if self.report_pending {
            self.report_pending = false;
            info!("timer cumulative {:?}", self.cumulative);
        }
        Ok(())
    }

    fn cleanup(&mut self) -> CadenceResult<()> {
        self.reset_forwarded = false;
        self.report_pending = false;
        Ok(())
    }
}
