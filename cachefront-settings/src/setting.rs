//! Refreshing setting cache
//!
//! A [`Setting`] holds one named value together with the function that loads
//! it and a [`RefreshPolicy`] deciding when that function runs again.
//! Reads never fail: until the first successful load the default is served,
//! afterwards the last successfully loaded value is served, even while a
//! refresh is running or after a refresh failed.

use cachefront_core::Result;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// When a setting's cached value is recomputed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Reload synchronously on every access
    Always,
    /// Serve the cached value, reload in the background after every access
    AsyncAfterAccess,
    /// Reload in the background once every `n` accesses
    AsyncAfterNAccesses(u32),
    /// Reload synchronously once this long has passed since the last successful load
    AfterElapsed(Duration),
    /// Reload in the background when an access follows this much idle time
    AsyncAfterElapsedSinceAccess(Duration),
}

/// Per-policy bookkeeping, guarded by the setting's lock
#[derive(Debug)]
enum PolicyState {
    Stateless,
    Counter { accesses: u32 },
    LastLoad(Instant),
    LastAccess(Instant),
}

impl PolicyState {
    fn fresh(policy: RefreshPolicy) -> Self {
        match policy {
            RefreshPolicy::Always | RefreshPolicy::AsyncAfterAccess => PolicyState::Stateless,
            RefreshPolicy::AsyncAfterNAccesses(_) => PolicyState::Counter { accesses: 0 },
            RefreshPolicy::AfterElapsed(_) => PolicyState::LastLoad(Instant::now()),
            RefreshPolicy::AsyncAfterElapsedSinceAccess(_) => {
                PolicyState::LastAccess(Instant::now())
            }
        }
    }
}

struct State<T> {
    value: T,
    loaded: bool,
    policy: PolicyState,
}

/// Outcome of the first-access path
enum FirstLoad<T> {
    /// This caller ran the initial load; serve this value
    Served(T),
    /// Someone else finished the initial load first
    AlreadyLoaded,
}

type LoadFn<T> = Box<dyn Fn() -> Result<T> + Send + Sync>;

struct Inner<T> {
    name: &'static str,
    default: T,
    policy: RefreshPolicy,
    load: LoadFn<T>,
    state: RwLock<State<T>>,
    /// Held across load and store, so a reload never starts before the previous one stored
    reload_lock: Mutex<()>,
}

/// A single named, independently refreshing configuration value
pub struct Setting<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Setting<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an unloaded setting; nothing is loaded until the first [`get`](Self::get)
    pub fn new<F>(name: &'static str, default: T, policy: RefreshPolicy, load: F) -> Self
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                name,
                state: RwLock::new(State {
                    value: default.clone(),
                    loaded: false,
                    policy: PolicyState::Stateless,
                }),
                default,
                policy,
                load: Box::new(load),
                reload_lock: Mutex::new(()),
            }),
        }
    }

    /// Whether a load has succeeded at least once
    pub fn is_loaded(&self) -> bool {
        self.inner.state.read().loaded
    }

    /// Current value, refreshing according to the policy.
    ///
    /// Blocks only for the first load or a due synchronous reload.
    pub fn get(&self) -> T {
        if !self.inner.state.read().loaded {
            match self.inner.first_load() {
                FirstLoad::Served(value) => return value,
                FirstLoad::AlreadyLoaded => {
                    tracing::trace!(setting = self.inner.name, "Setting loaded concurrently");
                }
            }
        }

        self.refresh();
        self.inner.state.read().value.clone()
    }

    fn refresh(&self) {
        let inner = &self.inner;
        match inner.policy {
            RefreshPolicy::Always => inner.reload(),
            RefreshPolicy::AsyncAfterAccess => self.spawn_reload(),
            RefreshPolicy::AsyncAfterNAccesses(n) => {
                let due = {
                    let mut state = inner.state.write();
                    match &mut state.policy {
                        PolicyState::Counter { accesses } => {
                            *accesses += 1;
                            if *accesses >= n {
                                *accesses = 0;
                                true
                            } else {
                                false
                            }
                        }
                        _ => false,
                    }
                };
                if due {
                    self.spawn_reload();
                }
            }
            RefreshPolicy::AfterElapsed(interval) => {
                let due = |policy: &PolicyState| {
                    matches!(policy, PolicyState::LastLoad(at) if at.elapsed() >= interval)
                };
                if due(&inner.state.read().policy) {
                    let mut state = inner.state.write();
                    // Another caller may have reloaded while we waited for the lock
                    if due(&state.policy) {
                        inner.reload_locked(&mut state);
                    }
                }
            }
            RefreshPolicy::AsyncAfterElapsedSinceAccess(idle) => {
                let due = {
                    let mut state = inner.state.write();
                    match &mut state.policy {
                        PolicyState::LastAccess(at) => {
                            let now = Instant::now();
                            let due = now.duration_since(*at) >= idle;
                            *at = now;
                            due
                        }
                        _ => false,
                    }
                };
                if due {
                    self.spawn_reload();
                }
            }
        }
    }

    fn spawn_reload(&self) {
        let inner = Arc::clone(&self.inner);
        spawn_detached(move || inner.reload());
    }
}

impl<T> Inner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn first_load(&self) -> FirstLoad<T> {
        let mut state = self.state.write();
        if state.loaded {
            return FirstLoad::AlreadyLoaded;
        }

        match (self.load)() {
            Ok(value) => {
                state.value = value.clone();
                state.loaded = true;
                state.policy = PolicyState::fresh(self.policy);
                tracing::debug!(setting = self.name, "Setting loaded");
                FirstLoad::Served(value)
            }
            Err(e) => {
                tracing::warn!(
                    setting = self.name,
                    error = %e,
                    "Failed to load setting, serving default"
                );
                FirstLoad::Served(self.default.clone())
            }
        }
    }

    /// Load without holding the state lock, then store the result
    fn reload(&self) {
        let _serial = self.reload_lock.lock();
        match (self.load)() {
            Ok(value) => {
                let mut state = self.state.write();
                Self::store(&mut state, value);
            }
            Err(e) => self.log_reload_failure(&e),
        }
    }

    fn reload_locked(&self, state: &mut State<T>) {
        match (self.load)() {
            Ok(value) => Self::store(state, value),
            Err(e) => self.log_reload_failure(&e),
        }
    }

    fn store(state: &mut State<T>, value: T) {
        state.value = value;
        state.loaded = true;
        if let PolicyState::LastLoad(at) = &mut state.policy {
            *at = Instant::now();
        }
    }

    fn log_reload_failure(&self, e: &cachefront_core::Error) {
        tracing::warn!(
            setting = self.name,
            error = %e,
            "Failed to reload setting, keeping cached value"
        );
    }
}

impl<T> fmt::Debug for Setting<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setting")
            .field("name", &self.inner.name)
            .field("policy", &self.inner.policy)
            .field("loaded", &self.inner.state.read().loaded)
            .finish()
    }
}

/// Run `task` off the caller's thread: on the blocking pool inside a tokio
/// runtime, on a plain thread otherwise.
fn spawn_detached<F>(task: F)
where
    F: FnOnce() + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(task);
        }
        Err(_) => {
            std::thread::spawn(task);
        }
    }
}
