use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerAction {
    Redraw,
    /// Fire `TimerFired { generation }` after `delay_ms`.
    Schedule { generation: u64, delay_ms: u64 },
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingTick {
    generation: u64,
    due_ms: i64,
}

/// Interactive-mode redraw timer.
///
/// Only one tick is ever live. Each schedule or cancel bumps the generation,
/// and a fired tick whose generation is not the live one is dropped, so a tick
/// already in flight when the face goes ambient or invisible cannot redraw or
/// reschedule.
#[derive(Debug, Clone)]
pub struct RedrawScheduler {
    interval_ms: u64,
    generation: u64,
    pending: Option<PendingTick>,
    torn_down: bool,
}

impl RedrawScheduler {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms: interval_ms.max(1),
            generation: 0,
            pending: None,
            torn_down: false,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_generation(&self) -> Option<u64> {
        self.pending.map(|tick| tick.generation)
    }

    pub fn pending_due_ms(&self) -> Option<i64> {
        self.pending.map(|tick| tick.due_ms)
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn start(&mut self, active: bool, now_ms: i64) -> Vec<SchedulerAction> {
        let mut actions = self.stop();
        if active && !self.torn_down {
            actions.push(self.schedule(now_ms, 0));
        }
        actions
    }

    pub fn stop(&mut self) -> Vec<SchedulerAction> {
        if self.pending.take().is_some() {
            self.generation = self.generation.wrapping_add(1);
            vec![SchedulerAction::Cancel]
        } else {
            Vec::new()
        }
    }

    pub fn on_tick(&mut self, generation: u64, active: bool, now_ms: i64) -> Vec<SchedulerAction> {
        match self.pending {
            Some(tick) if tick.generation == generation => {}
            _ => {
                debug!(
                    generation,
                    live = ?self.pending_generation(),
                    "dropping stale redraw tick"
                );
                return Vec::new();
            }
        }
        self.pending = None;

        let mut actions = vec![SchedulerAction::Redraw];
        if active && !self.torn_down {
            let delay_ms = next_delay_ms(now_ms, self.interval_ms);
            actions.push(self.schedule(now_ms, delay_ms));
        }
        actions
    }

    /// Invalidates the scheduler for good; nothing is scheduled afterwards.
    pub fn teardown(&mut self) -> Vec<SchedulerAction> {
        self.torn_down = true;
        self.stop()
    }

    fn schedule(&mut self, now_ms: i64, delay_ms: u64) -> SchedulerAction {
        self.generation = self.generation.wrapping_add(1);
        self.pending = Some(PendingTick {
            generation: self.generation,
            due_ms: now_ms.saturating_add(delay_ms as i64),
        });
        SchedulerAction::Schedule {
            generation: self.generation,
            delay_ms,
        }
    }
}

/// Delay that lands the next tick on the following interval boundary.
/// Always in `1..=interval_ms`.
pub fn next_delay_ms(now_ms: i64, interval_ms: u64) -> u64 {
    let interval = interval_ms.max(1);
    let phase = now_ms.rem_euclid(interval as i64) as u64;
    interval - phase
}
