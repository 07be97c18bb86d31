//! Single-threaded cooperative scheduler.
//!
//! Every task is a future polled at most once per tick with a no-op waker.
//! Tasks suspend only through [`next_tick`] (or by awaiting something that
//! does), so one tick advances every active task by exactly one step. There is
//! no preemption and nothing here blocks.

use core::cell::RefCell;
use core::future::Future;
use core::mem;
use core::pin::Pin;
use core::task::{Context, Poll};
use futures::FutureExt as _;
use futures::future::LocalBoxFuture;
use futures::task::noop_waker_ref;
use log::trace;
use std::rc::Rc;

/// A detached unit of work owned by the scheduler.
pub type Task = LocalBoxFuture<'static, ()>;

/// Cheap handle for launching detached tasks onto a [`Scheduler`].
///
/// Tasks spawned during a tick are admitted at the start of the next one.
#[derive(Clone, Default)]
pub struct Spawner {
    incoming: Rc<RefCell<Vec<Task>>>,
}

impl Spawner {
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.incoming.borrow_mut().push(task.boxed_local());
    }

    /// Tasks spawned but not yet admitted.
    pub fn queued(&self) -> usize {
        self.incoming.borrow().len()
    }
}

/// Drives every active task one step per tick.
#[derive(Default)]
pub struct Scheduler {
    spawner: Spawner,
    active: Vec<Task>,
    ticks: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawner(&self) -> Spawner {
        self.spawner.clone()
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.spawner.spawn(task);
    }

    /// Resume every active task once and drop the ones that finished.
    ///
    /// Returns the number of tasks still outstanding, including ones spawned
    /// during this tick.
    pub fn tick(&mut self) -> usize {
        let admitted = mem::take(&mut *self.spawner.incoming.borrow_mut());
        self.active.extend(admitted);

        let mut context = Context::from_waker(noop_waker_ref());
        self.active
            .retain_mut(|task| task.as_mut().poll(&mut context).is_pending());
        self.ticks = self.ticks.saturating_add(1);

        let outstanding = self.active.len() + self.spawner.queued();
        trace!("tick {} finished, {outstanding} tasks outstanding", self.ticks);
        outstanding
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_empty() && self.spawner.queued() == 0
    }

    /// Ticks run since construction.
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Tick until no task remains.
    ///
    /// Returns the ticks consumed, or `None` if `max_ticks` ran out first.
    pub fn run_until_idle(&mut self, max_ticks: u64) -> Option<u64> {
        self.run_until(max_ticks, |_| false)
    }

    /// Tick until `done` holds or no task remains.
    ///
    /// Returns the ticks consumed, or `None` if `max_ticks` ran out first.
    pub fn run_until<P>(&mut self, max_ticks: u64, mut done: P) -> Option<u64>
    where
        P: FnMut(&Self) -> bool,
    {
        let mut consumed = 0;
        while !self.is_idle() && !done(self) {
            if consumed >= max_ticks {
                return None;
            }
            self.tick();
            consumed += 1;
        }
        Some(consumed)
    }
}

/// Future that is pending once and ready on its next poll.
#[derive(Debug, Default)]
pub struct NextTick {
    yielded: bool,
}

impl Future for NextTick {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            context.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

/// Suspend the current task until the next scheduler tick.
pub fn next_tick() -> NextTick {
    NextTick::default()
}

enum Slot<'tasks, T> {
    Running(LocalBoxFuture<'tasks, T>),
    Done(Option<T>),
}

/// Steps a fixed set of futures one step each per poll, round-robin.
///
/// Resolves to their outputs in the order the futures were given, once every
/// one of them has finished.
pub struct RoundRobin<'tasks, T> {
    slots: Vec<Slot<'tasks, T>>,
}

impl<'tasks, T> RoundRobin<'tasks, T> {
    pub fn new<I>(tasks: I) -> Self
    where
        I: IntoIterator<Item = LocalBoxFuture<'tasks, T>>,
    {
        Self {
            slots: tasks.into_iter().map(Slot::Running).collect(),
        }
    }

    /// Futures that have not finished yet.
    pub fn remaining(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Running(_)))
            .count()
    }
}

impl<T: Unpin> Future for RoundRobin<'_, T> {
    type Output = Vec<T>;

    fn poll(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Vec<T>> {
        let this = self.get_mut();
        let mut running = false;
        for slot in &mut this.slots {
            if let Slot::Running(task) = slot {
                match task.as_mut().poll(context) {
                    Poll::Ready(output) => *slot = Slot::Done(Some(output)),
                    Poll::Pending => running = true,
                }
            }
        }
        if running {
            return Poll::Pending;
        }
        let outputs = this
            .slots
            .iter_mut()
            .filter_map(|slot| match slot {
                Slot::Done(output) => output.take(),
                Slot::Running(_) => None,
            })
            .collect();
        Poll::Ready(outputs)
    }
}
