// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Cancelable scheduler for delayed one-shot tasks
//!
//! A task is pending while its delay runs and running once the delay has
//! elapsed. Scheduling under a name that is still pending replaces the
//! pending task, which makes debouncing a single call. A running task is
//! never replaced, only cancelled explicitly.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

#[derive(Default)]
struct Tasks {
    pending: HashMap<String, (u64, AbortHandle)>,
    running: HashMap<u64, (String, AbortHandle)>,
}

pub struct Scheduler {
    tasks: Arc<Mutex<Tasks>>,
    generation: AtomicU64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(Mutex::new(Tasks::default())),
            generation: AtomicU64::new(0),
        }
    }

    /// Run `task` once after `delay`, replacing a pending task of the same name.
    ///
    /// Returns false when called outside a tokio runtime.
    pub fn schedule_once<F>(&self, name: &str, delay: Duration, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            warn!("Cannot schedule '{}' outside a runtime", name);
            return false;
        };

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let tasks = Arc::clone(&self.tasks);
        let task_name = name.to_string();

        // Held across spawn so the task cannot observe the map before its entry exists
        let mut guard = self.tasks.lock();

        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut t = tasks.lock();
                match t.pending.remove(&task_name) {
                    Some((g, abort)) if g == generation => {
                        t.running.insert(g, (task_name.clone(), abort));
                    }
                    Some(other) => {
                        t.pending.insert(task_name.clone(), other);
                    }
                    None => {}
                }
            }
            task.await;
            tasks.lock().running.remove(&generation);
        });

        if let Some((_, previous)) = guard
            .pending
            .insert(name.to_string(), (generation, handle.abort_handle()))
        {
            previous.abort();
            debug!("Replaced pending task '{}'", name);
        }
        true
    }

    /// Run `task` as soon as possible under `name`
    pub fn spawn<F>(&self, name: &str, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.schedule_once(name, Duration::ZERO, task)
    }

    /// Cancel the pending and running tasks named `name`; returns whether any existed
    pub fn cancel(&self, name: &str) -> bool {
        let mut tasks = self.tasks.lock();
        let mut found = false;
        if let Some((_, handle)) = tasks.pending.remove(name) {
            handle.abort();
            found = true;
        }
        tasks.running.retain(|_, (task_name, handle)| {
            if task_name == name {
                handle.abort();
                found = true;
                false
            } else {
                true
            }
        });
        found
    }

    /// Abort every pending and running task
    pub fn cancel_all(&self) {
        let mut tasks = self.tasks.lock();
        let count = tasks.pending.len() + tasks.running.len();
        for (_, (_, handle)) in tasks.pending.drain() {
            handle.abort();
        }
        for (_, (_, handle)) in tasks.running.drain() {
            handle.abort();
        }
        if count > 0 {
            debug!("Cancelled {} scheduled task(s)", count);
        }
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.tasks
            .lock()
            .pending
            .get(name)
            .map(|(_, h)| !h.is_finished())
            .unwrap_or(false)
    }

    pub fn active_count(&self) -> usize {
        let tasks = self.tasks.lock();
        tasks.pending.values().filter(|(_, h)| !h.is_finished()).count()
            + tasks.running.values().filter(|(_, h)| !h.is_finished()).count()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
