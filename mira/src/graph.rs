//! Stats graph sinks.
//!
//! A graph is a history ring of samples plus a display range and a
//! formatter. Producers push into the ring lock-free from the hot path;
//! the host's overlay calls [`GraphRegistry::render`] at frame rate.
//! Samples outside the display range are clipped by the graph, never by
//! whatever produced them.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use mira_core::ring::History;

/// Formats one rendered window: `(min, max, avg, freq, last)`.
pub type Formatter = fn(min: f32, max: f32, avg: f32, freq: f32, last: f32) -> String;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GraphHandle(usize);

pub struct GraphReport {
    pub name: String,
    pub text: String,
}

struct Entry {
    name: String,
    ring: Arc<History>,
    min: f32,
    max: f32,
    formatter: Formatter,
    last_pushes: usize,
    last_render: Instant,
}

#[derive(Default)]
pub struct GraphRegistry {
    entries: Mutex<Vec<Option<Entry>>>,
}

impl GraphRegistry {
    pub fn new() -> Self {
        GraphRegistry::default()
    }

    pub fn register(
        &self,
        name: &str,
        ring: Arc<History>,
        min: f32,
        max: f32,
        formatter: Formatter,
    ) -> GraphHandle {
        let entry = Entry {
            name: name.to_owned(),
            ring,
            min,
            max,
            formatter,
            last_pushes: 0,
            last_render: Instant::now(),
        };

        let mut entries = self.entries.lock().unwrap();

        for (index, slot) in entries.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(entry);
                return GraphHandle(index);
            }
        }

        entries.push(Some(entry));
        GraphHandle(entries.len() - 1)
    }

    pub fn invalidate(&self, handle: GraphHandle) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(slot) = entries.get_mut(handle.0) {
            *slot = None;
        }
    }

    /// Renders every live graph. Called from the host's overlay loop.
    pub fn render(&self) -> Vec<GraphReport> {
        let now = Instant::now();
        let mut window = Vec::new();
        let mut reports = Vec::new();

        let mut entries = self.entries.lock().unwrap();

        for entry in entries.iter_mut().flatten() {
            entry.ring.snapshot(&mut window);

            let mut min = f32::INFINITY;
            let mut max = f32::NEG_INFINITY;
            let mut sum = 0.0f64;

            for sample in &mut window {
                *sample = sample.clamp(entry.min, entry.max);
                min = min.min(*sample);
                max = max.max(*sample);
                sum += *sample as f64;
            }

            let (min, max, avg) = if window.is_empty() {
                (0.0, 0.0, 0.0)
            } else {
                (min, max, (sum / window.len() as f64) as f32)
            };

            let pushes = entry.ring.push_count();
            let elapsed = now.duration_since(entry.last_render).as_secs_f32();
            let freq = if elapsed > 0.0 {
                (pushes - entry.last_pushes) as f32 / elapsed
            } else {
                0.0
            };
            entry.last_pushes = pushes;
            entry.last_render = now;

            let last = entry
                .ring
                .last()
                .map(|last| last.clamp(entry.min, entry.max))
                .unwrap_or(0.0);

            reports.push(GraphReport {
                name: entry.name.clone(),
                text: (entry.formatter)(min, max, avg, freq, last),
            });
        }

        reports
    }
}

pub fn default_formatter(min: f32, max: f32, avg: f32, freq: f32, last: f32) -> String {
    format!("min:{min:6.2} max:{max:6.2} avg:{avg:6.2} {freq:5.1}/s cur:{last:6.2}")
}
