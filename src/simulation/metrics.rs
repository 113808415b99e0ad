use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct StepMetrics {
    pub wall_time: Duration,
    pub substeps: u32,
    pub collisions: usize,
}

/// Rolling window of step timings for progress reporting.
#[derive(Debug)]
pub struct PerformanceTracker {
    samples: VecDeque<StepMetrics>,
    max_samples: usize,
    current_step_start: Option<Instant>,
}

impl PerformanceTracker {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
            current_step_start: None,
        }
    }

    pub fn start_step(&mut self) {
        self.current_step_start = Some(Instant::now());
    }

    pub fn end_step(&mut self, substeps: u32, collisions: usize) {
        if let Some(start) = self.current_step_start.take() {
            if self.samples.len() >= self.max_samples {
                self.samples.pop_front();
            }
            self.samples.push_back(StepMetrics {
                wall_time: start.elapsed(),
                substeps,
                collisions,
            });
        }
    }

    pub fn average_step_time(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }

        let total: Duration = self.samples.iter().map(|s| s.wall_time).sum();
        total / self.samples.len() as u32
    }

    /// Physics sub-steps per wall-clock second over the window.
    pub fn substeps_per_second(&self) -> f64 {
        let total: Duration = self.samples.iter().map(|s| s.wall_time).sum();
        if total.is_zero() {
            return 0.0;
        }
        let substeps: u64 = self.samples.iter().map(|s| s.substeps as u64).sum();
        substeps as f64 / total.as_secs_f64()
    }

    pub fn collisions_in_window(&self) -> usize {
        self.samples.iter().map(|s| s.collisions).sum()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}
