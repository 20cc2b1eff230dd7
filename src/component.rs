//! The finite transition system modeling one half of a negotiation.
//!
//! A [`Component`] is a pure data object: finitely many states, a control
//! alphabet chosen by the component itself, a disturbance alphabet chosen by
//! its environment (which includes the other component once the two are
//! embedded in a [`crate::monitor::Monitor`]), a total output map, and a
//! possibly nondeterministic, possibly deadlocking transition relation.
//! Beyond lookups it has no operations of its own — the games are all
//! defined on top of a `Monitor`, not on a bare `Component`.

use std::collections::BTreeSet;

use crate::error::{NegotiationError, Result};

/// A finite nondeterministic transition system driven by control and
/// disturbance actions.
///
/// Transitions are stored as one flat `Vec<Vec<usize>>` indexed by
/// `(state * controls + ctl) * disturbances + dist`, each cell owning its
/// (possibly empty, possibly multi-valued) set of successors.
#[derive(Debug, Clone)]
pub struct Component {
    states: usize,
    controls: usize,
    disturbances: usize,
    outputs: usize,
    init: BTreeSet<usize>,
    out: Vec<usize>,
    post: Vec<Vec<usize>>,
}

impl Component {
    /// Builds a component, validating that `out` is total and in range, that
    /// `post` has exactly `states * controls * disturbances` rows, and that
    /// every successor and initial index is in bounds.
    pub fn new(
        states: usize,
        controls: usize,
        disturbances: usize,
        outputs: usize,
        init: BTreeSet<usize>,
        out: Vec<usize>,
        post: Vec<Vec<usize>>,
    ) -> Result<Self> {
        if out.len() != states {
            return Err(NegotiationError::Malformed(format!(
                "STATE_TO_OUTPUT has {} entries, expected {states}",
                out.len()
            )));
        }
        if let Some(&bad) = out.iter().find(|&&o| o >= outputs) {
            return Err(NegotiationError::Malformed(format!(
                "output index {bad} out of bounds for {outputs} outputs"
            )));
        }
        if post.len() != states * controls * disturbances {
            return Err(NegotiationError::Malformed(format!(
                "TRANSITION_POST has {} rows, expected {}",
                post.len(),
                states * controls * disturbances
            )));
        }
        for succs in &post {
            if let Some(&bad) = succs.iter().find(|&&s| s >= states) {
                return Err(NegotiationError::Malformed(format!(
                    "successor index {bad} out of bounds for {states} states"
                )));
            }
        }
        if let Some(&bad) = init.iter().find(|&&i| i >= states) {
            return Err(NegotiationError::Malformed(format!(
                "initial state {bad} out of bounds for {states} states"
            )));
        }
        Ok(Self {
            states,
            controls,
            disturbances,
            outputs,
            init,
            out,
            post,
        })
    }

    pub fn states(&self) -> usize {
        self.states
    }

    pub fn controls(&self) -> usize {
        self.controls
    }

    pub fn disturbances(&self) -> usize {
        self.disturbances
    }

    pub fn outputs(&self) -> usize {
        self.outputs
    }

    pub fn init(&self) -> &BTreeSet<usize> {
        &self.init
    }

    /// The output label of `state`. Panics if `state` is out of range —
    /// every caller in this crate only ever indexes reachable states.
    pub fn out(&self, state: usize) -> usize {
        self.out[state]
    }

    /// Flat index of the `(state, ctl, dist)` cell in the post array.
    pub fn addr(&self, state: usize, ctl: usize, dist: usize) -> usize {
        (state * self.controls + ctl) * self.disturbances + dist
    }

    /// The (possibly empty, possibly multi-valued) set of successors of
    /// `(state, ctl, dist)`.
    pub fn post(&self, state: usize, ctl: usize, dist: usize) -> &[usize] {
        &self.post[self.addr(state, ctl, dist)]
    }
}
