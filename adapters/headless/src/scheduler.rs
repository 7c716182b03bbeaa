use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use enemy_down_core::{Scheduler, TimerId, TimerTask};

/// Smallest period accepted; shorter periods would never let the clock advance.
const MIN_PERIOD: Duration = Duration::from_millis(1);

struct Timer {
    period: Duration,
    next_due: Duration,
    task: Option<TimerTask>,
}

#[derive(Default)]
struct Clock {
    now: Duration,
    next_id: u64,
    timers: BTreeMap<TimerId, Timer>,
    cancel_calls: BTreeMap<TimerId, u32>,
    fired: u64,
}

/// [`Scheduler`] driven by an explicit virtual clock.
///
/// Tasks never run on their own: [`ManualScheduler::advance`] fires every task
/// that falls due, in due-time order, on the calling thread. Tasks run without
/// the scheduler lock held, so they may cancel themselves or schedule more work.
#[derive(Default)]
pub struct ManualScheduler {
    clock: Mutex<Clock>,
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let clock = self.clock();
        f.debug_struct("ManualScheduler")
            .field("now", &clock.now)
            .field("active", &clock.timers.len())
            .finish()
    }
}

impl ManualScheduler {
    /// Creates a scheduler whose clock reads zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock().now
    }

    /// Moves the clock forward by `by`, running every task that falls due.
    ///
    /// Returns the number of task invocations. Tasks scheduled since the last
    /// call are due immediately, so `advance(Duration::ZERO)` runs them once.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.clock().now + by;
        let mut fired = 0;

        while let Some((id, mut task)) = self.take_due(target) {
            task();
            fired += 1;

            let mut clock = self.clock();
            clock.fired += 1;
            if let Some(timer) = clock.timers.get_mut(&id) {
                timer.task = Some(task);
            }
        }

        self.clock().now = target;
        fired
    }

    /// Reports whether the task is still scheduled.
    #[must_use]
    pub fn is_active(&self, timer: TimerId) -> bool {
        self.clock().timers.contains_key(&timer)
    }

    /// Number of tasks still scheduled.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.clock().timers.len()
    }

    /// Number of times [`Scheduler::cancel`] was called for the task, successful or not.
    #[must_use]
    pub fn cancel_calls(&self, timer: TimerId) -> u32 {
        self.clock().cancel_calls.get(&timer).copied().unwrap_or(0)
    }

    /// Total task invocations since creation.
    #[must_use]
    pub fn fired(&self) -> u64 {
        self.clock().fired
    }

    fn take_due(&self, target: Duration) -> Option<(TimerId, TimerTask)> {
        let mut clock = self.clock();
        let (id, due) = clock
            .timers
            .iter()
            .filter(|(_, timer)| timer.task.is_some() && timer.next_due <= target)
            .map(|(id, timer)| (*id, timer.next_due))
            .min_by_key(|(id, due)| (*due, *id))?;

        clock.now = clock.now.max(due);
        let timer = clock.timers.get_mut(&id)?;
        timer.next_due = due + timer.period;
        let task = timer.task.take()?;
        Some((id, task))
    }

    fn clock(&self) -> MutexGuard<'_, Clock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&self, period: Duration, task: TimerTask) -> TimerId {
        let mut clock = self.clock();
        clock.next_id += 1;
        let id = TimerId::new(clock.next_id);
        let next_due = clock.now;
        let _ = clock.timers.insert(
            id,
            Timer {
                period: period.max(MIN_PERIOD),
                next_due,
                task: Some(task),
            },
        );
        id
    }

    fn cancel(&self, timer: TimerId) -> bool {
        let mut clock = self.clock();
        *clock.cancel_calls.entry(timer).or_insert(0) += 1;
        clock.timers.remove(&timer).is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    fn counter(scheduler: &ManualScheduler, period: u64) -> (TimerId, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let task_count = Arc::clone(&count);
        let id = scheduler.schedule_repeating(
            Duration::from_secs(period),
            Box::new(move || {
                let _ = task_count.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (id, count)
    }

    #[test]
    fn first_run_is_immediate_then_periodic() {
        let scheduler = ManualScheduler::new();
        let (_, count) = counter(&scheduler, 5);

        assert_eq!(scheduler.advance(Duration::ZERO), 1);
        assert_eq!(scheduler.advance(Duration::from_secs(4)), 0);
        assert_eq!(scheduler.advance(Duration::from_secs(1)), 1);
        assert_eq!(scheduler.advance(Duration::from_secs(15)), 3);
        assert_eq!(count.load(Ordering::SeqCst), 5);
        assert_eq!(scheduler.now(), Duration::from_secs(20));
    }

    #[test]
    fn cancel_reports_whether_the_task_was_live() {
        let scheduler = ManualScheduler::new();
        let (id, count) = counter(&scheduler, 1);

        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        assert!(!scheduler.cancel(TimerId::new(99)));
        assert_eq!(scheduler.cancel_calls(id), 2);
        assert_eq!(scheduler.advance(Duration::from_secs(3)), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn tasks_may_cancel_themselves() {
        let scheduler = Arc::new(ManualScheduler::new());
        let slot = Arc::new(Mutex::new(None::<TimerId>));
        let runs = Arc::new(AtomicUsize::new(0));

        let task_scheduler = Arc::clone(&scheduler);
        let task_slot = Arc::clone(&slot);
        let task_runs = Arc::clone(&runs);
        let id = scheduler.schedule_repeating(
            Duration::from_secs(1),
            Box::new(move || {
                if task_runs.fetch_add(1, Ordering::SeqCst) == 2 {
                    if let Some(id) = *task_slot.lock().expect("slot") {
                        let _ = task_scheduler.cancel(id);
                    }
                }
            }),
        );
        *slot.lock().expect("slot") = Some(id);

        assert_eq!(scheduler.advance(Duration::from_secs(10)), 3);
        assert!(!scheduler.is_active(id));
        assert_eq!(scheduler.active_count(), 0);
    }

    #[test]
    fn interleaved_timers_fire_in_due_order() {
        let scheduler = Arc::new(ManualScheduler::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        for (label, period) in [("slow", 3), ("fast", 2)] {
            let order = Arc::clone(&order);
            let _ = scheduler.schedule_repeating(
                Duration::from_secs(period),
                Box::new(move || order.lock().expect("order").push(label)),
            );
        }

        let _ = scheduler.advance(Duration::from_secs(4));
        assert_eq!(
            *order.lock().expect("order"),
            vec!["slow", "fast", "fast", "slow", "fast"]
        );
    }
}
