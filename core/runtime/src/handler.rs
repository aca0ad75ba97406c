//! Single-consumer task queue backing one ability.
//!
//! Each ability runs on its own named worker thread that owns the state
//! outright. Callers enqueue closures; the worker runs them in arrival
//! order, so operations on one ability never interleave. `call` blocks for
//! the closure's answer, `post` is fire-and-forget. Dropping the handler
//! drains whatever is already queued, then joins the worker.

use ability_core::{AbilityError, Result};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

enum Task<S> {
    Run(Box<dyn FnOnce(&mut S) + Send>),
    Shutdown,
}

pub struct Handler<S> {
    sender: Sender<Task<S>>,
    worker: Option<JoinHandle<()>>,
    name: String,
}

impl<S: Send + 'static> Handler<S> {
    /// Spawns the worker thread that owns `state`.
    pub fn spawn(name: impl Into<String>, state: S) -> Result<Self> {
        let name = name.into();
        let (sender, receiver) = mpsc::channel::<Task<S>>();
        let worker = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_loop(state, receiver))
            .map_err(|err| AbilityError::Io {
                context: format!("spawn worker thread {name}"),
                source: err,
            })?;
        Ok(Self {
            sender,
            worker: Some(worker),
            name,
        })
    }

    /// Enqueues a task without waiting for it to run.
    pub fn post<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.sender
            .send(Task::Run(Box::new(task)))
            .map_err(|_| AbilityError::HandlerGone {
                context: self.name.clone(),
            })
    }

    /// Runs a task on the worker and blocks for its answer.
    pub fn call<R, F>(&self, task: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut S) -> R + Send + 'static,
    {
        let (reply_sender, reply_receiver) = mpsc::channel();
        self.post(move |state| {
            // The caller may have given up waiting; a dead reply channel
            // only means the answer goes unread.
            let _ = reply_sender.send(task(state));
        })?;
        reply_receiver.recv().map_err(|_| AbilityError::HandlerGone {
            context: self.name.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<S> Drop for Handler<S> {
    fn drop(&mut self) {
        // Shutdown queues behind pending tasks, so they drain first.
        let _ = self.sender.send(Task::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_loop<S>(mut state: S, receiver: Receiver<Task<S>>) {
    while let Ok(task) = receiver.recv() {
        match task {
            Task::Run(task) => task(&mut state),
            Task::Shutdown => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn call_returns_the_task_answer() {
        let handler = Handler::spawn("test-worker", 41i64).unwrap();
        let answer = handler
            .call(|state| {
                *state += 1;
                *state
            })
            .unwrap();
        assert_eq!(answer, 42);
    }

    #[test]
    fn tasks_run_in_arrival_order() {
        let handler = Handler::spawn("test-order", Vec::<u32>::new()).unwrap();
        for n in 0..8 {
            handler.post(move |state| state.push(n)).unwrap();
        }
        let seen = handler.call(|state| state.clone()).unwrap();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn drop_drains_queued_tasks_before_joining() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handler = Handler::spawn("test-drain", ()).unwrap();
        for _ in 0..16 {
            let counter = Arc::clone(&counter);
            handler
                .post(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        drop(handler);
        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn worker_threads_carry_their_name() {
        let handler = Handler::spawn("ability:Named", ()).unwrap();
        let observed = handler
            .call(|_| thread::current().name().map(str::to_string))
            .unwrap();
        assert_eq!(handler.name(), "ability:Named");
        assert_eq!(observed.as_deref(), Some("ability:Named"));
    }
}
