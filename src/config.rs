//! Tunables for a negotiation run, grouped into one struct passed by value
//! rather than threaded through `Negotiate::new` as positional arguments.

/// Configuration for [`crate::negotiate::Negotiate::iterative_deepening_search`].
#[derive(Debug, Clone)]
pub struct NegotiationConfig {
    /// Upper bound on the bisimulation depth `k` the search will try before
    /// giving up and reporting [`crate::negotiate::Outcome::Inconclusive`].
    /// `None` means unbounded (search until saturation).
    pub max_depth: Option<usize>,
    /// The depth `k` the first round starts from, instead of `0`. Useful when
    /// a caller already knows shallow spoilers won't suffice.
    pub k_start: usize,
    /// How much `k` grows by between outer rounds. Always `1`, matching
    /// spec.md §4.3's monotone `k += 1`; kept as a field rather than a
    /// hardcoded literal so a future search strategy can change it without
    /// touching `Negotiate`'s loop body.
    pub bisim_step: usize,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self { max_depth: None, k_start: 0, bisim_step: 1 }
    }
}
