//! Resource governor for concurrent rendering sessions.
//!
//! Caps the number of live rendering contexts across one capture call and
//! watches process memory. Acquisition blocks by fixed-interval polling
//! until a slot frees up; the returned [`SessionSlot`] releases its slot on
//! drop, so every exit path (including error paths) pairs the acquire with
//! a release. Memory pressure eviction is a best-effort policy: the oldest
//! registered session loses its slot, freeing capacity, but no attempt is
//! made to tear down the engine work behind it.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Interval between slot-availability polls.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug)]
struct ActiveSession {
    id: u64,
    started: Instant,
}

#[derive(Debug, Default)]
struct Registry {
    next_id: u64,
    active: Vec<ActiveSession>,
}

/// Caps concurrent rendering sessions and evicts on memory pressure.
#[derive(Debug, Clone)]
pub struct ResourceGovernor {
    registry: Arc<Mutex<Registry>>,
    max_sessions: usize,
    memory_limit_mb: u64,
}

/// RAII handle for one governed session slot.
///
/// Dropping the slot releases it. If the governor already evicted the slot
/// under memory pressure, the drop is a no-op.
pub struct SessionSlot {
    id: u64,
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for SessionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSlot").field("id", &self.id).finish()
    }
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.active.retain(|s| s.id != self.id);
        }
    }
}

impl SessionSlot {
    /// Identifier of this slot within the governor.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl ResourceGovernor {
    /// Create a governor with the given session cap and memory threshold.
    pub fn new(max_sessions: usize, memory_limit_mb: u64) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            max_sessions: max_sessions.max(1),
            memory_limit_mb,
        }
    }

    /// Governor configured from the capture settings.
    pub fn from_config(settings: &crate::config::CaptureSettings) -> Self {
        Self::new(settings.max_sessions, settings.memory_limit_mb)
    }

    /// Block until a slot is free, then register a session and return its guard.
    pub fn acquire(&self) -> SessionSlot {
        loop {
            if let Some(slot) = self.try_acquire() {
                return slot;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Register a session if a slot is free right now.
    pub fn try_acquire(&self) -> Option<SessionSlot> {
        let mut registry = self.registry.lock().ok()?;
        if registry.active.len() >= self.max_sessions {
            return None;
        }
        registry.next_id += 1;
        let id = registry.next_id;
        registry.active.push(ActiveSession {
            id,
            started: Instant::now(),
        });
        Some(SessionSlot {
            id,
            registry: Arc::clone(&self.registry),
        })
    }

    /// Number of currently registered sessions.
    pub fn active_sessions(&self) -> usize {
        self.registry.lock().map(|r| r.active.len()).unwrap_or(0)
    }

    /// Configured session cap.
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Sample process memory and evict the oldest session when over the limit.
    ///
    /// Eviction only happens while more than one session is active, and is
    /// best-effort: it frees the slot, not the in-flight work. Returns the
    /// evicted slot id, if any.
    pub fn check_memory(&self) -> Option<u64> {
        let rss_mb = process_rss_mb();
        if rss_mb <= self.memory_limit_mb {
            return None;
        }
        let mut registry = self.registry.lock().ok()?;
        if registry.active.len() <= 1 {
            return None;
        }
        let oldest_idx = registry
            .active
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| s.started)
            .map(|(idx, _)| idx)?;
        let evicted = registry.active.remove(oldest_idx);
        eprintln!(
            "Warning: memory pressure ({} MB > {} MB limit), evicting oldest session {}",
            rss_mb, self.memory_limit_mb, evicted.id
        );
        Some(evicted.id)
    }
}

/// Resident set size of this process in megabytes (0 where unsupported).
#[cfg(target_os = "linux")]
pub fn process_rss_mb() -> u64 {
    // VmRSS is reported in kB, independent of the kernel page size.
    let status = std::fs::read_to_string("/proc/self/status").unwrap_or_default();
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0)
        / 1024
}

/// Resident set size of this process in megabytes (0 where unsupported).
#[cfg(not(target_os = "linux"))]
pub fn process_rss_mb() -> u64 {
    0
}
