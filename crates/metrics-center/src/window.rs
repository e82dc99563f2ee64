//! Fixed-capacity recent-outcome ring

/// Ring buffer of recent outcomes with index-based eviction
///
/// Backs the stability score: the window is split into sub-windows and
/// the variance of the per-sub-window success rate measures how
/// consistent a locator has been over time.
#[derive(Debug, Clone)]
pub struct OutcomeWindow {
    slots: Vec<bool>,
    capacity: usize,
    head: usize,
    len: usize,
}

impl Default for OutcomeWindow {
    fn default() -> Self {
        Self::new(32)
    }
}

impl OutcomeWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            slots: vec![false; capacity],
            capacity,
            head: 0,
            len: 0,
        }
    }

    /// Record an outcome, evicting the oldest when full
    pub fn push(&mut self, success: bool) {
        self.slots[self.head] = success;
        self.head = (self.head + 1) % self.capacity;
        self.len = (self.len + 1).min(self.capacity);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Outcomes oldest-first
    fn chronological(&self) -> Vec<bool> {
        let start = (self.head + self.capacity - self.len) % self.capacity;
        (0..self.len)
            .map(|i| self.slots[(start + i) % self.capacity])
            .collect()
    }

    /// Stability in [0,1]: low variance of success rate across
    /// sub-windows means high stability. With fewer than two complete
    /// sub-windows the score is the neutral 0.5.
    pub fn stability(&self, sub_windows: usize) -> f64 {
        let sub_windows = sub_windows.max(2);
        let sub_size = (self.capacity / sub_windows).max(1);
        let complete = self.len / sub_size;
        if complete < 2 {
            return 0.5;
        }

        let outcomes = self.chronological();
        let recent = &outcomes[outcomes.len() - complete * sub_size..];
        let rates: Vec<f64> = recent
            .chunks(sub_size)
            .map(|chunk| {
                chunk.iter().filter(|s| **s).count() as f64 / chunk.len() as f64
            })
            .collect();

        let mean = rates.iter().sum::<f64>() / rates.len() as f64;
        let variance =
            rates.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / rates.len() as f64;
        // Maximum possible variance of values in [0,1] is 0.25
        (1.0 - variance / 0.25).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eviction_keeps_capacity() {
        let mut window = OutcomeWindow::new(4);
        for i in 0..10 {
            window.push(i % 2 == 0);
        }
        assert_eq!(window.len(), 4);
    }

    #[test]
    fn test_chronological_order() {
        let mut window = OutcomeWindow::new(4);
        window.push(true);
        window.push(false);
        window.push(true);
        assert_eq!(window.chronological(), vec![true, false, true]);

        window.push(false);
        window.push(true); // evicts the first `true`
        assert_eq!(window.chronological(), vec![false, true, false, true]);
    }

    #[test]
    fn test_consistent_outcomes_are_maximally_stable() {
        let mut window = OutcomeWindow::new(32);
        for _ in 0..32 {
            window.push(true);
        }
        assert_eq!(window.stability(4), 1.0);

        let mut all_failures = OutcomeWindow::new(32);
        for _ in 0..32 {
            all_failures.push(false);
        }
        // Consistently failing is still "stable" behavior
        assert_eq!(all_failures.stability(4), 1.0);
    }

    #[test]
    fn test_flapping_outcomes_are_unstable() {
        let mut window = OutcomeWindow::new(32);
        // Whole sub-windows of success alternating with failure
        for i in 0..32 {
            window.push((i / 8) % 2 == 0);
        }
        assert!(window.stability(4) < 0.5);
    }

    #[test]
    fn test_sparse_window_is_neutral() {
        let mut window = OutcomeWindow::new(32);
        for _ in 0..7 {
            window.push(true);
        }
        assert_eq!(window.stability(4), 0.5);
    }
}
