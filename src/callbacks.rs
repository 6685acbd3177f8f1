//! Lifecycle hooks
//!
//! Events are queued while the pool state is locked and dispatched once the
//! lock is released, so a hook may call back into the pool.

use crate::connection::ConnectionInfo;
use parking_lot::RwLock;
use std::sync::Arc;

type InfoHook = Arc<dyn Fn(&ConnectionInfo) + Send + Sync>;
type FailureHook = Arc<dyn Fn(&ConnectionInfo, &str) + Send + Sync>;
type ExhaustedHook = Arc<dyn Fn() + Send + Sync>;

/// Lifecycle event queued for dispatch
#[derive(Debug, Clone)]
pub(crate) enum PoolEvent {
    Created(ConnectionInfo),
    Closed(ConnectionInfo),
    Failed(ConnectionInfo, String),
    HealthCheckFailed(ConnectionInfo),
    Exhausted,
}

#[derive(Default, Clone)]
struct Hooks {
    on_created: Option<InfoHook>,
    on_closed: Option<InfoHook>,
    on_failed: Option<FailureHook>,
    on_health_check_failed: Option<InfoHook>,
    on_exhausted: Option<ExhaustedHook>,
}

/// Registry of optional lifecycle callbacks
#[derive(Default)]
pub(crate) struct PoolCallbacks {
    hooks: RwLock<Hooks>,
}

impl PoolCallbacks {
    pub fn set_on_created(&self, f: InfoHook) {
        self.hooks.write().on_created = Some(f);
    }

    pub fn set_on_closed(&self, f: InfoHook) {
        self.hooks.write().on_closed = Some(f);
    }

    pub fn set_on_failed(&self, f: FailureHook) {
        self.hooks.write().on_failed = Some(f);
    }

    pub fn set_on_health_check_failed(&self, f: InfoHook) {
        self.hooks.write().on_health_check_failed = Some(f);
    }

    pub fn set_on_exhausted(&self, f: ExhaustedHook) {
        self.hooks.write().on_exhausted = Some(f);
    }

    /// Fire hooks for each event in order. Must be called without the state lock held.
    pub fn dispatch(&self, events: Vec<PoolEvent>) {
        if events.is_empty() {
            return;
        }
        // Clone out so hooks can re-register without deadlocking on the RwLock
        let hooks = self.hooks.read().clone();
        for event in events {
            match event {
                PoolEvent::Created(info) => {
                    if let Some(f) = &hooks.on_created {
                        f(&info);
                    }
                }
                PoolEvent::Closed(info) => {
                    if let Some(f) = &hooks.on_closed {
                        f(&info);
                    }
                }
                PoolEvent::Failed(info, reason) => {
                    if let Some(f) = &hooks.on_failed {
                        f(&info, &reason);
                    }
                }
                PoolEvent::HealthCheckFailed(info) => {
                    if let Some(f) = &hooks.on_health_check_failed {
                        f(&info);
                    }
                }
                PoolEvent::Exhausted => {
                    if let Some(f) = &hooks.on_exhausted {
                        f();
                    }
                }
            }
        }
    }
}
