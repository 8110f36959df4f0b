/// Aggregate outcome of a graded session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionResult {
    total: usize,
    correct_count: usize,
}

impl SessionResult {
    /// Builds a result summary. `correct_count` is clamped to `total`.
    #[must_use]
    pub fn new(total: usize, correct_count: usize) -> Self {
        Self {
            total,
            correct_count: correct_count.min(total),
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.correct_count
    }

    #[must_use]
    pub fn incorrect_count(&self) -> usize {
        self.total - self.correct_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_add_up() {
        let result = SessionResult::new(10, 6);
        assert_eq!(result.total(), 10);
        assert_eq!(result.correct_count(), 6);
        assert_eq!(result.incorrect_count(), 4);
    }

    #[test]
    fn correct_count_is_clamped() {
        let result = SessionResult::new(3, 7);
        assert_eq!(result.correct_count(), 3);
        assert_eq!(result.incorrect_count(), 0);
    }
}
