//! Universal-acceptance safety automata over a dense integer alphabet.
//!
//! A [`SafetyAutomaton`] accepts the set of "safe" behaviors: state `0` is
//! the absorbing reject state, and a run is accepting iff *every* branch of
//! a (possibly nondeterministic) run avoids state 0 forever. This module
//! provides the operations spec'd for the minimization and negotiation
//! pipeline — binary [`SafetyAutomaton::product`], [`SafetyAutomaton::trim`],
//! and [`SafetyAutomaton::determinize`] — plus the "accept everything"
//! constructor installed as the initial guarantee/assumption pair.

use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::error::{NegotiationError, Result};

/// A nondeterministic, universal-acceptance safety automaton.
///
/// Transitions are stored flat, one `Vec<usize>` per `(state, input)` cell,
/// indexed by [`SafetyAutomaton::addr`]. Invariant maintained by every
/// constructor in this module: state 0 has a self-loop on every input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyAutomaton {
    states: usize,
    inputs: usize,
    init: BTreeSet<usize>,
    post: Vec<Vec<usize>>,
}

impl SafetyAutomaton {
    /// Builds a safety automaton from an explicit post relation, validating
    /// bounds and the reject-self-loop invariant.
    pub fn new(states: usize, inputs: usize, init: BTreeSet<usize>, post: Vec<Vec<usize>>) -> Result<Self> {
        if post.len() != states * inputs {
            return Err(NegotiationError::Malformed(format!(
                "TRANSITION_POST has {} rows, expected {}",
                post.len(),
                states * inputs
            )));
        }
        for row in &post {
            if let Some(&bad) = row.iter().find(|&&s| s >= states) {
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
        let automaton = Self { states, inputs, init, post };
        for j in 0..automaton.inputs {
            debug_assert_eq!(automaton.post(0, j), &[0], "reject state must self-loop on every input");
        }
        Ok(automaton)
    }

    /// The "accept every string" automaton over `inputs` disturbance/output
    /// symbols: state 1 is initial and accepting with self-loops on every
    /// input, state 0 is an unreachable reject sink.
    pub fn accepts_all_ctor(inputs: usize) -> Self {
        let mut post = vec![Vec::new(); 2 * inputs];
        for i in 0..2 {
            for j in 0..inputs {
                post[i * inputs + j] = vec![i];
            }
        }
        Self { states: 2, inputs, init: BTreeSet::from([1]), post }
    }

    pub fn states(&self) -> usize {
        self.states
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn init(&self) -> &BTreeSet<usize> {
        &self.init
    }

    pub fn addr(&self, state: usize, input: usize) -> usize {
        state * self.inputs + input
    }

    pub fn post(&self, state: usize, input: usize) -> &[usize] {
        &self.post[self.addr(state, input)]
    }

    /// Existential one-step predecessor of a set of concrete states, over
    /// every input. Used by [`crate::spoilers::Spoilers`]'s distance-based
    /// refinement.
    pub fn pre_set(&self, targets: &BTreeSet<usize>) -> BTreeSet<usize> {
        let mut pre = BTreeSet::new();
        for s in 0..self.states {
            'input: for j in 0..self.inputs {
                for &t in self.post(s, j) {
                    if targets.contains(&t) {
                        pre.insert(s);
                        break 'input;
                    }
                }
            }
        }
        pre
    }

    /// Binary synchronous product with universal acceptance: the joint state
    /// `(i1, i2)` is reject iff either coordinate is reject. Fails if the
    /// two input alphabets disagree in size.
    pub fn product(a: &Self, b: &Self) -> Result<Self> {
        if a.inputs != b.inputs {
            return Err(NegotiationError::AlphabetMismatch(format!(
                "product: left automaton has {} inputs, right has {}",
                a.inputs, b.inputs
            )));
        }
        let inputs = a.inputs;
        let states = (a.states - 1) * (b.states - 1) + 1;
        let new_ind = |i1: usize, i2: usize| -> usize {
            if i1 == 0 || i2 == 0 {
                0
            } else {
                (i1 - 1) * (b.states - 1) + (i2 - 1) + 1
            }
        };
        let mut init = BTreeSet::new();
        for &i1 in &a.init {
            for &i2 in &b.init {
                init.insert(new_ind(i1, i2));
            }
        }
        let mut post = vec![Vec::new(); states * inputs];
        for j in 0..inputs {
            post[j] = vec![0];
        }
        for i1 in 1..a.states {
            for i2 in 1..b.states {
                let idx = new_ind(i1, i2);
                for j in 0..inputs {
                    let mut succs = BTreeSet::new();
                    for &l1 in a.post(i1, j) {
                        for &l2 in b.post(i2, j) {
                            succs.insert(new_ind(l1, l2));
                        }
                    }
                    post[idx * inputs + j] = succs.into_iter().collect();
                }
            }
        }
        Self::new(states, inputs, init, post)
    }

    /// Retains only states reachable from init, renumbering so that 0
    /// remains the reject state. Does not alter the accepted language.
    pub fn trim(&self) -> Self {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();
        for &i in &self.init {
            if seen.insert(i) {
                queue.push_back(i);
            }
        }
        while let Some(s) = queue.pop_front() {
            for j in 0..self.inputs {
                for &succ in self.post(s, j) {
                    if seen.insert(succ) {
                        queue.push_back(succ);
                    }
                }
            }
        }
        let mut new_to_old = vec![0usize];
        let mut old_to_new = vec![0usize; self.states];
        for &s in &seen {
            if s != 0 {
                old_to_new[s] = new_to_old.len();
                new_to_old.push(s);
            }
        }
        let new_states = new_to_old.len();
        let init = self.init.iter().map(|&i| old_to_new[i]).collect();
        let mut post = vec![Vec::new(); new_states * self.inputs];
        for (new_i, &old_i) in new_to_old.iter().enumerate() {
            for j in 0..self.inputs {
                post[new_i * self.inputs + j] =
                    self.post(old_i, j).iter().map(|&s| old_to_new[s]).collect();
            }
        }
        Self { states: new_states, inputs: self.inputs, init, post }
    }

    /// Subset-construction determinization. Any subset containing the reject
    /// state collapses to the singleton reject subset `{0}`.
    pub fn determinize(&self) -> Self {
        let reject_subset: BTreeSet<usize> = BTreeSet::from([0]);
        let mut subset_index: HashMap<BTreeSet<usize>, usize> = HashMap::new();
        subset_index.insert(reject_subset.clone(), 0);
        subset_index.insert(self.init.clone(), 1);
        let mut queue = VecDeque::from([reject_subset, self.init.clone()]);
        let mut next_index = 2usize;
        let mut det_post: Vec<usize> = Vec::new();
        while let Some(subset) = queue.pop_front() {
            for j in 0..self.inputs {
                let mut succ = BTreeSet::new();
                let mut hits_reject = false;
                'pre: for &s in &subset {
                    for &t in self.post(s, j) {
                        if t == 0 {
                            hits_reject = true;
                            break 'pre;
                        }
                        succ.insert(t);
                    }
                }
                let succ = if hits_reject { BTreeSet::from([0]) } else { succ };
                let idx = *subset_index.entry(succ.clone()).or_insert_with(|| {
                    queue.push_back(succ);
                    let idx = next_index;
                    next_index += 1;
                    idx
                });
                det_post.push(idx);
            }
        }
        let post = det_post.into_iter().map(|s| vec![s]).collect();
        Self { states: next_index, inputs: self.inputs, init: BTreeSet::from([1]), post }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepting_once(inputs: usize) -> SafetyAutomaton {
        // two states: 1 initial, rejects on the second symbol of every kind
        SafetyAutomaton::new(
            2,
            inputs,
            BTreeSet::from([1]),
            (0..2)
                .flat_map(|s| (0..inputs).map(move |_| if s == 0 { vec![0] } else { vec![0] }))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn accepts_all_has_self_loops() {
        let a = SafetyAutomaton::accepts_all_ctor(3);
        for j in 0..3 {
            assert_eq!(a.post(1, j), &[1]);
            assert_eq!(a.post(0, j), &[0]);
        }
        assert_eq!(a.init(), &BTreeSet::from([1]));
    }

    #[test]
    fn product_rejects_alphabet_mismatch() {
        let a = SafetyAutomaton::accepts_all_ctor(2);
        let b = SafetyAutomaton::accepts_all_ctor(3);
        let err = SafetyAutomaton::product(&a, &b).unwrap_err();
        assert!(matches!(err, NegotiationError::AlphabetMismatch(_)));
    }

    #[test]
    fn product_of_two_accept_all_is_accept_all() {
        let a = SafetyAutomaton::accepts_all_ctor(2);
        let b = SafetyAutomaton::accepts_all_ctor(2);
        let p = SafetyAutomaton::product(&a, &b).unwrap();
        assert_eq!(p.states(), 2);
        for j in 0..2 {
            assert_eq!(p.post(1, j), &[1]);
        }
    }

    #[test]
    fn product_intersects_languages() {
        // A rejects everything immediately on input 0 from state 1 (self loop to 0);
        // accepts on input 1. B is universal. Product should mirror A.
        let mut post_a = vec![Vec::new(); 2 * 2];
        post_a[0 * 2 + 0] = vec![0];
        post_a[0 * 2 + 1] = vec![0];
        post_a[1 * 2 + 0] = vec![0];
        post_a[1 * 2 + 1] = vec![1];
        let a = SafetyAutomaton::new(2, 2, BTreeSet::from([1]), post_a).unwrap();
        let b = SafetyAutomaton::accepts_all_ctor(2);
        let p = SafetyAutomaton::product(&a, &b).unwrap();
        assert_eq!(p.post(1, 0), &[0]);
        assert_eq!(p.post(1, 1), &[1]);
    }

    #[test]
    fn trim_drops_unreachable_states() {
        // state 2 is unreachable from init {1}
        let mut post = vec![Vec::new(); 3 * 1];
        post[0] = vec![0];
        post[1] = vec![1];
        post[2] = vec![0];
        let a = SafetyAutomaton::new(3, 1, BTreeSet::from([1]), post).unwrap();
        let trimmed = a.trim();
        assert_eq!(trimmed.states(), 2);
    }

    #[test]
    fn determinize_collapses_reject_subsets() {
        // nondeterministic: from 1 on input 0, goes to both 1 and 0 (rejecting)
        let mut post = vec![Vec::new(); 2 * 1];
        post[0] = vec![0];
        post[1] = vec![0, 1];
        let a = SafetyAutomaton::new(2, 1, BTreeSet::from([1]), post).unwrap();
        let det = a.determinize();
        // exactly one successor per (state, input)
        for s in 0..det.states() {
            for j in 0..det.inputs() {
                assert_eq!(det.post(s, j).len(), 1);
            }
        }
        // determinized automaton must reject immediately since nondeterministic
        // choice could hit 0
        assert_eq!(det.post(1, 0), &[0]);
    }

    #[test]
    fn determinize_is_idempotent_on_deterministic_input() {
        let a = accepting_once(2);
        let det = a.determinize();
        for s in 0..det.states() {
            for j in 0..det.inputs() {
                assert_eq!(det.post(s, j).len(), 1);
            }
        }
    }
}
