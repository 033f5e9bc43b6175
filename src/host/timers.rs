//! Timer hosts.
//!
//! Both hosts share one method table and one schedule. [`ManualTimers`] runs
//! on a virtual clock that only moves when [`ManualTimers::advance`] is
//! called. [`ThreadTimers`] owns a worker thread that fires due timers in
//! real time. Handles returned by `set-timer`/`set-interval` are integers
//! accepted by either clearing method, as is the original callback.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use tracing::debug;

use crate::error::{HookError, HookResult, HostError, HostResult};
use crate::stream::Callback;
use crate::value::Value;

use super::{callback_arg, unknown_method, Arg, HostObject, Member};

const METHODS: &[&str] = &["set-timer", "clear-timer", "set-interval", "clear-interval", "pending"];

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct TimerEntry {
    callback: Callback,
    deadline_ms: u64,
    period_ms: Option<u64>,
}

/// Pending timers keyed by handle. Times are milliseconds since host start.
#[derive(Debug, Default)]
struct Schedule {
    next_handle: i64,
    timers: BTreeMap<i64, TimerEntry>,
}

impl Schedule {
    fn insert(&mut self, callback: Callback, now_ms: u64, delay_ms: u64, repeat: bool) -> i64 {
        self.next_handle += 1;
        let handle = self.next_handle;
        // A zero period would never let the clock move past it.
        let period_ms = repeat.then(|| delay_ms.max(1));
        self.timers.insert(
            handle,
            TimerEntry {
                callback,
                deadline_ms: now_ms.saturating_add(delay_ms),
                period_ms,
            },
        );
        handle
    }

    fn clear(&mut self, method: &str, target: &Arg) -> HostResult<bool> {
        let handle = match target {
            Arg::Value(Value::Int(handle)) => Some(*handle),
            Arg::Callback(cb) => self
                .timers
                .iter()
                .find(|(_, entry)| entry.callback == *cb)
                .map(|(handle, _)| *handle),
            _ => {
                return Err(HostError::InvalidArgument {
                    method: method.to_string(),
                    index: 0,
                    reason: "expected a timer handle or callback".to_string(),
                })
            }
        };
        Ok(handle.is_some_and(|h| self.timers.remove(&h).is_some()))
    }

    /// Pop the earliest timer due at or before `now_ms`, rescheduling intervals.
    fn next_due(&mut self, now_ms: u64) -> Option<(u64, Callback)> {
        let (&handle, _) = self
            .timers
            .iter()
            .filter(|(_, entry)| entry.deadline_ms <= now_ms)
            .min_by_key(|(handle, entry)| (entry.deadline_ms, **handle))?;

        let entry = self.timers.get_mut(&handle)?;
        let fired_at = entry.deadline_ms;
        let callback = entry.callback.clone();
        match entry.period_ms.map(|period| fired_at.saturating_add(period)) {
            Some(next) if next > fired_at => entry.deadline_ms = next,
            // One-shot, or an interval pinned at the end of the clock.
            _ => {
                self.timers.remove(&handle);
            }
        }
        Some((fired_at, callback))
    }

    fn invoke(&mut self, shape: &'static str, now_ms: u64, method: &str, args: &[Arg]) -> HostResult<Member> {
        match method {
            "set-timer" | "set-interval" => {
                let callback = callback_arg(method, args, 0)?;
                let delay_ms = match args.get(1) {
                    None => 0,
                    Some(Arg::Value(Value::Int(ms))) if *ms >= 0 => ms.unsigned_abs(),
                    Some(_) => {
                        return Err(HostError::InvalidArgument {
                            method: method.to_string(),
                            index: 1,
                            reason: "expected a non-negative delay in milliseconds".to_string(),
                        })
                    }
                };
                let handle = self.insert(callback, now_ms, delay_ms, method == "set-interval");
                debug!(shape, method, handle, delay_ms, "scheduled timer");
                Ok(Member::Value(Value::Int(handle)))
            }
            "clear-timer" | "clear-interval" => {
                let target = args.first().ok_or_else(|| HostError::MissingArgument {
                    method: method.to_string(),
                    index: 0,
                })?;
                Ok(Member::Value(Value::Bool(self.clear(method, target)?)))
            }
            "pending" => Ok(Member::Value(Value::Int(self.timers.len() as i64))),
            other => Err(unknown_method(shape, other)),
        }
    }
}

#[derive(Debug, Default)]
struct ManualState {
    now_ms: u64,
    schedule: Schedule,
}

/// Timers driven by a virtual clock.
///
/// Callbacks receive the virtual firing time in milliseconds as `Value::Int`.
#[derive(Debug, Default)]
pub struct ManualTimers {
    state: Mutex<ManualState>,
}

impl ManualTimers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in milliseconds.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        lock(&self.state).now_ms
    }

    /// Number of scheduled timers.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.state).schedule.timers.len()
    }

    /// Move the clock forward, firing every timer that comes due in deadline
    /// order. Returns the number of callbacks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = {
            let state = lock(&self.state);
            state
                .now_ms
                .saturating_add(u64::try_from(by.as_millis()).unwrap_or(u64::MAX))
        };

        let mut fired = 0;
        loop {
            let due = {
                let mut state = lock(&self.state);
                let due = state.schedule.next_due(target);
                if let Some((at, _)) = &due {
                    state.now_ms = *at;
                }
                due
            };
            let Some((at, callback)) = due else {
                break;
            };
            callback.call(Value::Int(i64::try_from(at).unwrap_or(i64::MAX)));
            fired += 1;
        }

        lock(&self.state).now_ms = target;
        fired
    }
}

impl HostObject for ManualTimers {
    fn shape(&self) -> &'static str {
        "manual-timers"
    }

    fn methods(&self) -> &'static [&'static str] {
        METHODS
    }

    fn property(&self, name: &str) -> Member {
        match name {
            "now" => Member::Value(Value::Int(i64::try_from(self.now_ms()).unwrap_or(i64::MAX))),
            _ => Member::Absent,
        }
    }

    fn invoke(&self, method: &str, args: Vec<Arg>) -> HostResult<Member> {
        let mut state = lock(&self.state);
        let now_ms = state.now_ms;
        state.schedule.invoke(self.shape(), now_ms, method, &args)
    }
}

/// Configuration for [`ThreadTimers`].
#[derive(Debug, Clone)]
pub struct TimerConfig {
    /// How often the worker checks for due timers.
    pub resolution: Duration,
    /// Name of the worker thread.
    pub thread_name: String,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            resolution: Duration::from_millis(2),
            thread_name: "hookstream-timers".to_string(),
        }
    }
}

#[derive(Debug)]
enum ControlMsg {
    Shutdown,
}

/// Timers fired in real time by a dedicated worker thread.
///
/// Callbacks run on the worker thread and receive the wall-clock firing time
/// as `Value::Timestamp`. Dropping the host stops the worker.
#[derive(Debug)]
pub struct ThreadTimers {
    epoch: Instant,
    schedule: Arc<Mutex<Schedule>>,
    control_tx: Sender<ControlMsg>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadTimers {
    /// Start the worker thread.
    ///
    /// # Errors
    /// `HookError::Internal` if the thread cannot be spawned.
    pub fn new(cfg: TimerConfig) -> HookResult<Self> {
        let epoch = Instant::now();
        let schedule = Arc::new(Mutex::new(Schedule::default()));
        let (control_tx, control_rx) = bounded::<ControlMsg>(1);

        let worker_schedule = Arc::clone(&schedule);
        let resolution = cfg.resolution.max(Duration::from_millis(1));
        let join = thread::Builder::new()
            .name(cfg.thread_name.clone())
            .spawn(move || worker_loop(epoch, resolution, &worker_schedule, &control_rx))
            .map_err(|e| HookError::internal(format!("failed to spawn timer worker: {e}")))?;

        Ok(Self {
            epoch,
            schedule,
            control_tx,
            join: Mutex::new(Some(join)),
        })
    }

    fn now_ms(&self) -> u64 {
        elapsed_ms(self.epoch)
    }

    /// Number of scheduled timers.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.schedule).timers.len()
    }
}

impl HostObject for ThreadTimers {
    fn shape(&self) -> &'static str {
        "thread-timers"
    }

    fn methods(&self) -> &'static [&'static str] {
        METHODS
    }

    fn invoke(&self, method: &str, args: Vec<Arg>) -> HostResult<Member> {
        let now_ms = self.now_ms();
        lock(&self.schedule).invoke(self.shape(), now_ms, method, &args)
    }
}

impl Drop for ThreadTimers {
    fn drop(&mut self) {
        let _ = self.control_tx.try_send(ControlMsg::Shutdown);
        // Detach rather than join: the last handle may be dropped from a
        // timer callback running on the worker itself.
        if let Ok(mut guard) = self.join.lock() {
            drop(guard.take());
        }
    }
}

fn elapsed_ms(epoch: Instant) -> u64 {
    u64::try_from(epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn worker_loop(epoch: Instant, resolution: Duration, schedule: &Mutex<Schedule>, control_rx: &Receiver<ControlMsg>) {
    loop {
        let shutdown = select! {
            recv(control_rx) -> msg => match msg {
                Ok(ControlMsg::Shutdown) | Err(_) => true,
            },
            default(resolution) => false,
        };
        if shutdown {
            break;
        }

        let now_ms = elapsed_ms(epoch);
        loop {
            // The guard must be released before the callback runs: callbacks
            // routinely clear their own timer.
            let due = lock(schedule).next_due(now_ms);
            let Some((_, callback)) = due else {
                break;
            };
            callback.call(Value::Timestamp(Utc::now()));
        }
    }
    debug!("timer worker stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting() -> (Arc<AtomicUsize>, Callback) {
        let hits = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&hits);
        let cb = Callback::new(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });
        (hits, cb)
    }

    fn handle_of(member: Member) -> i64 {
        match member {
            Member::Value(Value::Int(h)) => h,
            other => panic!("expected handle, got {other:?}"),
        }
    }

    #[test]
    fn timeout_fires_once() {
        let timers = ManualTimers::new();
        let (hits, cb) = counting();
        timers
            .invoke("set-timer", vec![Arg::Callback(cb), Arg::from(10)])
            .unwrap();

        assert_eq!(timers.advance(Duration::from_millis(9)), 0);
        assert_eq!(timers.advance(Duration::from_millis(50)), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn scheduling_at_the_end_of_the_clock_saturates() {
        let timers = ManualTimers::new();
        timers.advance(Duration::MAX);
        assert_eq!(timers.now_ms(), u64::MAX);

        let (hits, cb) = counting();
        timers
            .invoke("set-timer", vec![Arg::Callback(cb.clone()), Arg::from(1)])
            .unwrap();
        timers
            .invoke("set-interval", vec![Arg::Callback(cb), Arg::from(5)])
            .unwrap();

        // Both are due at u64::MAX; the interval cannot be rescheduled past it.
        assert_eq!(timers.advance(Duration::from_millis(10)), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn interval_repeats_until_cleared_by_handle() {
        let timers = ManualTimers::new();
        let (hits, cb) = counting();
        let handle = handle_of(
            timers
                .invoke("set-interval", vec![Arg::Callback(cb), Arg::from(100)])
                .unwrap(),
        );

        assert_eq!(timers.advance(Duration::from_millis(350)), 3);
        assert_eq!(timers.now_ms(), 350);

        let cleared = timers.invoke("clear-interval", vec![Arg::from(handle)]).unwrap();
        assert!(matches!(cleared, Member::Value(Value::Bool(true))));
        assert_eq!(timers.advance(Duration::from_millis(1000)), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn clear_accepts_the_callback() {
        let timers = ManualTimers::new();
        let (_, cb) = counting();
        timers
            .invoke("set-interval", vec![Arg::Callback(cb.clone()), Arg::from(5)])
            .unwrap();
        let cleared = timers.invoke("clear-timer", vec![Arg::Callback(cb)]).unwrap();
        assert!(matches!(cleared, Member::Value(Value::Bool(true))));
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn timers_fire_in_deadline_order() {
        let timers = ManualTimers::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for (tag, delay) in [("late", 30), ("early", 10)] {
            let order = Arc::clone(&order);
            let cb = Callback::new(move |_| order.lock().unwrap().push(tag));
            timers
                .invoke("set-timer", vec![Arg::Callback(cb), Arg::from(delay)])
                .unwrap();
        }
        timers.advance(Duration::from_millis(40));
        assert_eq!(*order.lock().unwrap(), vec!["early", "late"]);
    }

    #[test]
    fn negative_delay_is_rejected() {
        let timers = ManualTimers::new();
        let (_, cb) = counting();
        let err = timers
            .invoke("set-timer", vec![Arg::Callback(cb), Arg::from(-1)])
            .unwrap_err();
        assert!(matches!(err, HostError::InvalidArgument { index: 1, .. }));
    }

    #[test]
    fn thread_timers_fire_and_clear() {
        let timers = ThreadTimers::new(TimerConfig::default()).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let cb = Callback::new(move |v| {
            let _ = tx.send(v);
        });
        let handle = handle_of(
            timers
                .invoke("set-interval", vec![Arg::Callback(cb), Arg::from(5)])
                .unwrap(),
        );

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(first.is_timestamp());

        timers.invoke("clear-interval", vec![Arg::from(handle)]).unwrap();
        assert_eq!(timers.pending(), 0);
        // Drain anything already in flight, then expect silence.
        while rx.recv_timeout(Duration::from_millis(30)).is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }
}
