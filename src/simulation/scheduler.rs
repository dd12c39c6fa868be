//! Discrete-event scheduler driving the simulation timeline.
//!
//! Everything in the simulation runs as a callback executed by the
//! [`EventQueue`], one at a time on the calling thread, in non-decreasing
//! simulated time. A callback never blocks; waiting is expressed by
//! scheduling another callback in the future.
//!
//! Events carry an optional node context. While an event with a context is
//! executing, the context is visible through [`Scheduler::context`] and to
//! the log capture, so log lines are attributed to the node the event runs
//! "as" rather than to whoever scheduled it.
//!
//! Same-time events fire in the order they were scheduled.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::fmt;
use std::time::Duration;

use super::types::{NodeId, SimTime};

/// A unit of scheduled work.
pub type Callback = Box<dyn FnOnce()>;

/// Handle to a scheduled event, usable to cancel it before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

thread_local! {
    static CURRENT_CONTEXT: Cell<Option<(NodeId, SimTime)>> = const { Cell::new(None) };
}

/// Node context and simulated time of the event executing on this thread, if any.
pub fn current_context() -> Option<(NodeId, SimTime)> {
    CURRENT_CONTEXT.with(|c| c.get())
}

/// Collaborator interface the channel schedules deliveries through.
pub trait Scheduler {
    /// Current simulated time.
    fn now(&self) -> SimTime;

    /// Node context of the executing event, `None` outside events or for context-free events.
    fn context(&self) -> Option<NodeId>;

    /// Run `callback` at `now + delay`, executing in the context of `context`.
    fn schedule_with_context(&self, context: NodeId, delay: Duration, callback: Callback) -> EventId;

    /// Retract a pending event. Returns false if it already ran or was cancelled.
    fn cancel(&self, id: EventId) -> bool;
}

struct ScheduledEvent {
    at: SimTime,
    seq: u64,
    context: Option<NodeId>,
    callback: Callback,
}

// Min-heap on (time, sequence)
impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other.at.cmp(&self.at).then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct QueueState {
    now: SimTime,
    next_seq: u64,
    heap: BinaryHeap<ScheduledEvent>,
    // Ids of events that are scheduled and neither executed nor cancelled
    pending: HashSet<u64>,
    context: Option<NodeId>,
    executed: u64,
}

/// Single-threaded discrete-event queue.
///
/// Interior mutability lets callbacks schedule or cancel further events while
/// the queue is running them. `step`/`run` must not be called from inside a
/// callback.
#[derive(Default)]
pub struct EventQueue {
    state: RefCell<QueueState>,
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("EventQueue")
            .field("now", &state.now)
            .field("pending", &state.pending.len())
            .field("executed", &state.executed)
            .finish()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, at: SimTime, context: Option<NodeId>, callback: Callback) -> EventId {
        let mut state = self.state.borrow_mut();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.pending.insert(seq);
        state.heap.push(ScheduledEvent { at, seq, context, callback });
        EventId(seq)
    }

    /// Schedule `callback` after `delay`, inheriting the context of the executing event.
    pub fn schedule(&self, delay: Duration, callback: Callback) -> EventId {
        let (at, context) = {
            let state = self.state.borrow();
            (state.now + delay, state.context)
        };
        self.push(at, context, callback)
    }

    /// Schedule `callback` at an absolute time without a node context.
    /// Times in the past are executed at the current time.
    pub fn schedule_at(&self, at: SimTime, callback: Callback) -> EventId {
        let at = at.max(self.now());
        self.push(at, None, callback)
    }

    /// Execute the next pending event. Returns false when the queue is empty.
    pub fn step(&self) -> bool {
        let event = {
            let mut state = self.state.borrow_mut();
            loop {
                let Some(event) = state.heap.pop() else {
                    return false;
                };
                if state.pending.remove(&event.seq) {
                    break event;
                }
            }
        };

        {
            let mut state = self.state.borrow_mut();
            state.now = event.at;
            state.context = event.context;
        }
        let previous = CURRENT_CONTEXT.with(|c| c.replace(event.context.map(|node| (node, event.at))));

        (event.callback)();

        CURRENT_CONTEXT.with(|c| c.set(previous));
        let mut state = self.state.borrow_mut();
        state.context = None;
        state.executed += 1;
        true
    }

    /// Run until no events remain.
    pub fn run(&self) {
        while self.step() {}
    }

    /// Run every event due at or before `until`, then advance the clock to `until`.
    pub fn run_until(&self, until: SimTime) {
        while self.next_event_time().is_some_and(|at| at <= until) {
            self.step();
        }
        let mut state = self.state.borrow_mut();
        if state.now < until {
            state.now = until;
        }
    }

    /// Time of the earliest live event.
    pub fn next_event_time(&self) -> Option<SimTime> {
        let mut state = self.state.borrow_mut();
        // Discard cancelled events sitting at the top of the heap
        while let Some(top) = state.heap.peek() {
            if state.pending.contains(&top.seq) {
                return Some(top.at);
            }
            state.heap.pop();
        }
        None
    }

    /// Number of live (not executed, not cancelled) events.
    pub fn pending_count(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Number of events executed so far.
    pub fn executed_count(&self) -> u64 {
        self.state.borrow().executed
    }
}

impl Scheduler for EventQueue {
    fn now(&self) -> SimTime {
        self.state.borrow().now
    }

    fn context(&self) -> Option<NodeId> {
        self.state.borrow().context
    }

    fn schedule_with_context(&self, context: NodeId, delay: Duration, callback: Callback) -> EventId {
        let at = self.now() + delay;
        self.push(at, Some(context), callback)
    }

    fn cancel(&self, id: EventId) -> bool {
        self.state.borrow_mut().pending.remove(&id.0)
    }
}
