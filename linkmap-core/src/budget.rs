use std::time::{Duration, Instant};

/// Upper bound on the work a single analysis call may do.
///
/// A step is one node update for ranking and one edge exploration for cycle
/// detection. The default budget is unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisBudget {
    pub deadline: Option<Instant>,
    pub max_steps: Option<u64>,
}

impl AnalysisBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            max_steps: None,
        }
    }

    pub fn with_max_steps(max_steps: u64) -> Self {
        Self {
            deadline: None,
            max_steps: Some(max_steps),
        }
    }

    pub fn exhausted(&self, steps: u64) -> bool {
        if self.max_steps.is_some_and(|max| steps >= max) {
            return true;
        }
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}
