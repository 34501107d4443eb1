use std::time::Duration;

use cadence_core::{CadenceResult, Msg, ResponderContext, Subsystem, SubsystemView};

use crate::clock::Clock;

/// Data vocabulary of [`SimpleTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleTimerData {
    /// Elapsed time since construction or the last reset, answered as
    /// a [`Duration`] payload.
    Elapsed,
}

/// Action vocabulary of [`SimpleTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleTimerAction {
    /// Restart the measurement from now.
    Reset,
}

/// Leaf subsystem measuring elapsed time against an injected clock.
///
/// The reading is sampled once per cycle in the basic data phase, so
/// every consumer in the same cycle sees the same value whether it
/// peeks the getter or sends a data request.
pub struct SimpleTimer {
    clock: Box<dyn Clock>,
    epoch: Duration,
    elapsed: Duration,
}

impl SimpleTimer {
    pub fn new(clock: impl Clock + 'static) -> Self {
        let epoch = clock.now();
        SimpleTimer {
            clock: Box::new(clock),
            epoch,
            elapsed: Duration::ZERO,
        }
    }

    /// Elapsed time as of this cycle's basic data update.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl Subsystem for SimpleTimer {
    fn name(&self) -> &'static str {
        "simple_timer"
    }

    fn update_basic_data(&mut self, _view: &SubsystemView<'_>) -> CadenceResult<()> {
        self.elapsed = self.clock.now().saturating_sub(self.epoch);
        Ok(())
    }

    fn receive_data_request(
        &mut self,
        msg: &Msg,
        _ctx: &mut ResponderContext<'_>,
    ) -> CadenceResult<()> {
        if let Some(SimpleTimerData::Elapsed) = msg.identifier() {
            msg.set_payload(self.elapsed);
        }
        Ok(())
    }

    fn receive_action_request(
        &mut self,
        msg: &Msg,
        _ctx: &mut ResponderContext<'_>,
    ) -> CadenceResult<()> {
        if let Some(SimpleTimerAction::Reset) = msg.identifier() {
            self.epoch = self.clock.now();
            self.elapsed = Duration::ZERO;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use cadence_core::{Manager, SubsystemTree};

    #[test]
    fn test_elapsed_follows_clock() {
        let clock = ManualClock::new();
        let mut tree = SubsystemTree::new();
        let timer = tree.insert_top(SimpleTimer::new(clock.clone()));
        let mut manager = Manager::new(tree).unwrap();

        clock.advance(Duration::from_millis(120));
        manager.cycle().unwrap();
        assert_eq!(
            manager.peek::<SimpleTimer>(timer).unwrap().elapsed(),
            Duration::from_millis(120)
        );
    }

    #[test]
    fn test_reading_is_per_cycle_not_live() {
        let clock = ManualClock::new();
        let mut tree = SubsystemTree::new();
        let timer = tree.insert_top(SimpleTimer::new(clock.clone()));
        let mut manager = Manager::new(tree).unwrap();

        manager.cycle().unwrap();
        clock.advance(Duration::from_millis(500));
        // No cycle yet: the sampled reading is unchanged.
        assert_eq!(
            manager.peek::<SimpleTimer>(timer).unwrap().elapsed(),
            Duration::ZERO
        );
    }

    #[test]
    fn test_reset_restarts_measurement() {
        let clock = ManualClock::new();
        let mut tree = SubsystemTree::new();
        let timer = tree.insert_top(SimpleTimer::new(clock.clone()));
        let mut manager = Manager::new(tree).unwrap();

        clock.advance(Duration::from_millis(300));
        manager.cycle().unwrap();

        manager
            .post_request(timer, &Msg::action(SimpleTimerAction::Reset))
            .unwrap();
        manager.cycle().unwrap();

        clock.advance(Duration::from_millis(40));
        manager.cycle().unwrap();
        assert_eq!(
            manager.peek::<SimpleTimer>(timer).unwrap().elapsed(),
            Duration::from_millis(40)
        );
    }

    #[test]
    fn test_data_request_answered_with_elapsed() {
        let clock = ManualClock::new();
        let mut tree = SubsystemTree::new();
        let timer = tree.insert_top(SimpleTimer::new(clock.clone()));
        let mut manager = Manager::new(tree).unwrap();

        clock.advance(Duration::from_secs(2));
        let msg = Msg::data(SimpleTimerData::Elapsed);
        manager.post_request(timer, &msg).unwrap();
        manager.cycle().unwrap();

        assert_eq!(msg.take_payload::<Duration>(), Some(Duration::from_secs(2)));
    }
}
