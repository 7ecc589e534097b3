//! Light colour streaming
//!
//! Lights join the index once the renderer acknowledges them. Each batch
//! reads the current colour of every indexed light from the host and emits an
//! update only for lights whose colour moved since the last one sent.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use rackproto::OscMessage;

use crate::codec;
use crate::host::GraphHost;
use crate::model::{LightId, ModuleId, Rgba};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedLight {
    pub host_key: i32,
    pub last_sent: Rgba,
}

#[derive(Debug, Default)]
pub struct LightIndex {
    lights: BTreeMap<(ModuleId, LightId), TrackedLight>,
}

impl LightIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an acknowledged light. Re-registering keeps one entry.
    pub fn insert(&mut self, module: ModuleId, light: LightId, host_key: i32, color: Rgba) {
        self.lights.insert(
            (module, light),
            TrackedLight {
                host_key,
                last_sent: color,
            },
        );
    }

    pub fn remove_module(&mut self, module: ModuleId) {
        self.lights.retain(|(m, _), _| *m != module);
    }

    pub fn clear(&mut self) {
        self.lights.clear();
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, module: ModuleId, light: LightId) -> bool {
        self.lights.contains_key(&(module, light))
    }

    /// Update records for every light whose colour changed; remembers what
    /// was emitted.
    pub fn collect_updates<H: GraphHost + ?Sized>(&mut self, host: &H) -> Vec<OscMessage> {
        let mut updates = Vec::new();
        for (&(module, light), tracked) in self.lights.iter_mut() {
            let Some(color) = host.light_color(module, tracked.host_key) else {
                continue;
            };
            if !color.approx_eq(&tracked.last_sent) {
                tracked.last_sent = color;
                updates.push(codec::light_update(module, light, color));
            }
        }
        updates
    }
}

/// Rate limit for light batches
#[derive(Debug)]
pub struct LightThrottle {
    interval: Duration,
    last_run: Option<Instant>,
}

impl LightThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: None,
        }
    }

    /// True at most once per interval; records the run when it says yes
    pub fn due(&mut self, now: Instant) -> bool {
        match self.last_run {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_run = Some(now);
                true
            }
        }
    }
}
