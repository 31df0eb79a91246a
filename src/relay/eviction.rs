//! Oldest-first eviction policy.
//!
//! The session directory (by count), the in-flight table (by count) and the
//! pending buffer (by bytes) each implement [`OldestFirst`] over their own
//! storage. Only the loop is shared: each caller decides how an evictee is
//! answered.

/// A collection that sheds its oldest entries while over budget.
pub trait OldestFirst {
    /// What leaves the collection on eviction.
    type Evicted;

    /// Whether the collection currently exceeds its budget.
    fn over_budget(&self) -> bool;

    /// Remove and return the oldest entry.
    fn pop_oldest(&mut self) -> Option<Self::Evicted>;

    /// Evict until back under budget, handing each evictee to `notify`.
    ///
    /// Returns the number of entries evicted.
    fn evict_excess(&mut self, mut notify: impl FnMut(Self::Evicted)) -> usize {
        let mut evicted = 0;
        while self.over_budget() {
            let Some(oldest) = self.pop_oldest() else {
                break;
            };
            notify(oldest);
            evicted += 1;
        }
        evicted
    }
}
