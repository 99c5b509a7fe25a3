use crate::MAX_PROGRESS;

/// Truncated arithmetic mean of a set of progress values.
///
/// Returns 0 for an empty set. The mean is truncated, never rounded:
/// `[1, 2]` gives 1.
pub fn aggregate_progress<I>(values: I) -> u8
where
    I: IntoIterator<Item = u8>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0u64, 0u64), |(sum, count), p| (sum + u64::from(p), count + 1));

    if count == 0 {
        return 0;
    }
    // The mean of values <= 100 is itself <= 100.
    (sum / count) as u8
}

/// Converts a running byte count into whole percentages.
///
/// [`advance`](Self::advance) only yields a value when the whole percentage
/// changes, so a transport can forward every yielded value to its progress
/// callback without flooding it.
#[derive(Debug, Clone)]
pub struct PercentCounter {
    total: u64,
    sent: u64,
    last: Option<u8>,
}

impl PercentCounter {
    /// Creates a counter for a payload of `total` bytes.
    pub fn new(total: u64) -> Self {
        Self {
            total,
            sent: 0,
            last: None,
        }
    }

    /// Records `bytes` more bytes sent.
    ///
    /// Returns the new percentage if it differs from the last one yielded.
    pub fn advance(&mut self, bytes: u64) -> Option<u8> {
        self.sent = self.sent.saturating_add(bytes).min(self.total);
        let percent = self.percent();
        if self.last == Some(percent) {
            return None;
        }
        self.last = Some(percent);
        Some(percent)
    }

    /// Yields 100 unless it was already yielded.
    pub fn finish(&mut self) -> Option<u8> {
        self.sent = self.total;
        if self.last == Some(MAX_PROGRESS) {
            return None;
        }
        self.last = Some(MAX_PROGRESS);
        Some(MAX_PROGRESS)
    }

    /// Current whole percentage.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return if self.last.is_some() { MAX_PROGRESS } else { 0 };
        }
        ((u128::from(self.sent) * 100) / u128::from(self.total)) as u8
    }

    /// Bytes recorded so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_empty_is_zero() {
        assert_eq!(aggregate_progress(Vec::<u8>::new()), 0);
    }

    #[test]
    fn aggregate_is_mean() {
        assert_eq!(aggregate_progress([20, 60]), 40);
        assert_eq!(aggregate_progress([33, 34, 35]), 34);
    }

    #[test]
    fn aggregate_truncates() {
        assert_eq!(aggregate_progress([1, 2]), 1);
        assert_eq!(aggregate_progress([99, 100]), 99);
    }

    #[test]
    fn aggregate_all_complete() {
        assert_eq!(aggregate_progress([100, 100, 100]), 100);
    }

    #[test]
    fn counter_yields_only_changes() {
        let mut counter = PercentCounter::new(1000);
        assert_eq!(counter.advance(5), Some(0));
        assert_eq!(counter.advance(4), None);
        assert_eq!(counter.advance(1), Some(1));
        assert_eq!(counter.advance(489), Some(49));
        assert_eq!(counter.advance(501), Some(100));
        assert_eq!(counter.finish(), None);
    }

    #[test]
    fn counter_is_monotonic_and_ends_at_100() {
        let mut counter = PercentCounter::new(12_345);
        let mut seen = Vec::new();
        for _ in 0..100 {
            if let Some(p) = counter.advance(200) {
                seen.push(p);
            }
        }
        if let Some(p) = counter.finish() {
            seen.push(p);
        }
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.last(), Some(&100));
    }

    #[test]
    fn counter_caps_at_total() {
        let mut counter = PercentCounter::new(10);
        counter.advance(50);
        assert_eq!(counter.sent(), 10);
        assert_eq!(counter.percent(), 100);
    }

    #[test]
    fn counter_empty_payload() {
        let mut counter = PercentCounter::new(0);
        assert_eq!(counter.percent(), 0);
        assert_eq!(counter.finish(), Some(100));
        assert_eq!(counter.percent(), 100);
    }
}
