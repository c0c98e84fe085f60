//! Participation tally and the fairness pick.
//!
//! Pure bookkeeping over `(participation_counts, total_turns, budgets)` in
//! registration order. No names, no ledger, no logging: the scheduler owns
//! those concerns.

/// Per-worker participation state, indexed by registration order.
#[derive(Debug, Clone)]
pub struct ParticipationTally {
    counts: Vec<u64>,
    budgets: Vec<f64>,
    total_turns: u64,
}

impl ParticipationTally {
    pub fn new(workers: usize) -> Self {
        Self {
            counts: vec![0; workers],
            budgets: vec![0.0; workers],
            total_turns: 0,
        }
    }

    pub fn total_turns(&self) -> u64 {
        self.total_turns
    }

    pub fn count(&self, index: usize) -> u64 {
        self.counts.get(index).copied().unwrap_or(0)
    }

    pub fn budget(&self, index: usize) -> f64 {
        self.budgets.get(index).copied().unwrap_or(0.0)
    }

    /// Expected share minus actual turns; positive means under-served
    pub fn imbalance(&self, index: usize) -> f64 {
        if self.counts.is_empty() {
            return 0.0;
        }
        let expected = self.total_turns as f64 / self.counts.len() as f64;
        expected - self.count(index) as f64
    }

    /// Fold the current imbalance of every worker into its running budget.
    pub fn accrue(&mut self) {
        for index in 0..self.budgets.len() {
            let imbalance = self.imbalance(index);
            self.budgets[index] += imbalance;
        }
    }

    /// Fairness choice: among the least-served workers, the highest budget,
    /// then the earliest registration.
    ///
    /// Restricting to the least-served set keeps a worker that already spoke
    /// more than someone else from being chosen on budget alone.
    pub fn fairest(&self) -> Option<usize> {
        let min_count = self.counts.iter().copied().min()?;
        let mut best: Option<usize> = None;
        for (index, &count) in self.counts.iter().enumerate() {
            if count != min_count {
                continue;
            }
            match best {
                // Strictly greater only: earlier registration keeps ties
                Some(current) if self.budgets[index].total_cmp(&self.budgets[current]).is_gt() => {
                    best = Some(index);
                }
                Some(_) => {}
                None => best = Some(index),
            }
        }
        best
    }

    /// Count one turn for `index`
    pub fn record(&mut self, index: usize) {
        if let Some(count) = self.counts.get_mut(index) {
            *count += 1;
            self.total_turns += 1;
        }
    }
}
