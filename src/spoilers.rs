//! Distance-based bounded bisimulation minimization of a safety automaton.
//!
//! [`Spoilers`] keeps both the full automaton of spoiling behaviors and a
//! quotient of it, starting from the coarsest possible partition (everything
//! non-rejecting lumped into one abstract state) and refining it outward from
//! the rejecting sink, one existential-predecessor frontier at a time. The
//! refinement depth `k` is the number of frontier-growing rounds that have
//! actually split a partition; growing `k` to the number of concrete states
//! recovers the full automaton exactly.

use std::collections::BTreeSet;

use crate::safety_automaton::SafetyAutomaton;

/// Bounded-bisimulation quotient of a [`SafetyAutomaton`].
#[derive(Debug, Clone)]
pub struct Spoilers {
    k: usize,
    full: SafetyAutomaton,
    mini: SafetyAutomaton,
    /// Abstract state index -> its concrete members. `quotient[0] == {0}`.
    quotient: Vec<BTreeSet<usize>>,
    /// Concrete state -> its abstract state(s). A concrete state belongs to
    /// more than one class only transiently, mid-[`Spoilers::refine_step`];
    /// outside of that call every entry is a singleton.
    inv_quotient: Vec<BTreeSet<usize>>,
    /// Abstract states whose concrete membership is final for this depth.
    refined_partitions: BTreeSet<usize>,
}

impl Spoilers {
    /// Starts from the coarsest quotient: `{0}` as the reject class, every
    /// other concrete state lumped into a single class 1.
    pub fn new(full: SafetyAutomaton) -> Self {
        let mut quotient = vec![BTreeSet::from([0]), BTreeSet::new()];
        let mut inv_quotient = vec![BTreeSet::from([1usize]); full.states()];
        inv_quotient[0] = BTreeSet::from([0]);
        for s in 1..full.states() {
            quotient[1].insert(s);
        }
        let refined_partitions = BTreeSet::from([0]);
        let mut spoilers = Self {
            k: 0,
            mini: SafetyAutomaton::accepts_all_ctor(full.inputs()),
            full,
            quotient,
            inv_quotient,
            refined_partitions,
        };
        spoilers.compute_mini_transitions();
        spoilers
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn full(&self) -> &SafetyAutomaton {
        &self.full
    }

    pub fn mini(&self) -> &SafetyAutomaton {
        &self.mini
    }

    /// Recomputes the minimized automaton's transitions from the current
    /// quotient: a `j`-edge exists between abstract states `qi` and `ql` iff
    /// some concrete member of `qi` has a `j`-edge into some concrete member
    /// of `ql`.
    fn compute_mini_transitions(&mut self) {
        let ns = self.quotient.len();
        let ni = self.full.inputs();
        let mut post = vec![BTreeSet::new(); ns * ni];
        for i in 0..self.full.states() {
            for &qi in &self.inv_quotient[i] {
                for j in 0..ni {
                    for &t in self.full.post(i, j) {
                        for &ql in &self.inv_quotient[t] {
                            post[qi * ni + j].insert(ql);
                        }
                    }
                }
            }
        }
        let init = self
            .full
            .init()
            .iter()
            .flat_map(|&i| self.inv_quotient[i].iter().copied())
            .collect();
        let post = post.into_iter().map(|s| s.into_iter().collect()).collect();
        self.mini = SafetyAutomaton::new(ns, ni, init, post)
            .expect("quotient transitions are always well-formed by construction");
    }

    /// One round of distance-based refinement: every concrete state in the
    /// existential predecessor of the already-refined frontier, that is not
    /// itself already exposed, gets peeled off into its own singleton class.
    /// Returns whether any state was actually peeled off this round.
    fn refine_step(&mut self) -> bool {
        let mut exposed = BTreeSet::new();
        for &ia in &self.refined_partitions {
            exposed.extend(self.quotient[ia].iter().copied());
        }
        let pre = self.full.pre_set(&exposed);
        let new_partition: BTreeSet<usize> = pre.difference(&exposed).copied().collect();
        if new_partition.is_empty() {
            return false;
        }
        self.k += 1;

        let mut last = self.quotient.pop().expect("quotient always has a last class");
        for &ic in &new_partition {
            last.remove(&ic);
            let old_idx = *self.inv_quotient[ic].iter().next().expect("inv_quotient entries are never empty");
            let new_idx = self.quotient.len();
            self.quotient.push(BTreeSet::from([ic]));
            // `ic` transiently belongs to both its old class and `new_idx`
            // until the old membership is dropped on the next line (a no-op
            // when the freed slot number was reused as `new_idx`).
            self.inv_quotient[ic].insert(new_idx);
            if old_idx != new_idx {
                self.inv_quotient[ic].remove(&old_idx);
            }
            self.refined_partitions.insert(new_idx);
        }
        let last_idx = self.quotient.len();
        for &ic in &last {
            self.inv_quotient[ic] = BTreeSet::from([last_idx]);
        }
        self.quotient.push(last);
        true
    }

    /// Runs `k` refinement rounds (or until the frontier saturates, whichever
    /// comes first), then rebuilds the minimized automaton's transitions.
    /// `k = None` means "exact": the minimized automaton becomes the full one.
    pub fn bounded_bisim(&mut self, k: Option<usize>) {
        let Some(k) = k else {
            self.mini = self.full.clone();
            return;
        };
        for _ in 0..k {
            if !self.refine_step() {
                break;
            }
        }
        self.compute_mini_transitions();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A 4-state chain: 1 -> 2 -> 3 -> 3 (self loop), all on input 0, plus
    // a reject edge from every state on input 1.
    fn chain() -> SafetyAutomaton {
        let mut post = vec![Vec::new(); 4 * 2];
        post[0 * 2 + 0] = vec![0];
        post[0 * 2 + 1] = vec![0];
        post[1 * 2 + 0] = vec![2];
        post[1 * 2 + 1] = vec![0];
        post[2 * 2 + 0] = vec![3];
        post[2 * 2 + 1] = vec![0];
        post[3 * 2 + 0] = vec![3];
        post[3 * 2 + 1] = vec![0];
        SafetyAutomaton::new(4, 2, BTreeSet::from([1]), post).unwrap()
    }

    #[test]
    fn fresh_spoilers_starts_with_two_classes() {
        let s = Spoilers::new(chain());
        assert_eq!(s.k(), 0);
        assert_eq!(s.mini().states(), 2);
    }

    #[test]
    fn infinite_bisim_matches_full_automaton() {
        let full = chain();
        let mut s = Spoilers::new(full.clone());
        s.bounded_bisim(None);
        assert_eq!(s.mini().states(), full.states());
    }

    #[test]
    fn bounded_bisim_refines_monotonically() {
        let mut s = Spoilers::new(chain());
        s.bounded_bisim(Some(1));
        let k1 = s.k();
        let states1 = s.mini().states();
        s.bounded_bisim(Some(1));
        assert!(s.k() >= k1);
        assert!(s.mini().states() >= states1);
    }

    #[test]
    fn bounded_bisim_saturates_without_growing_past_full() {
        let full = chain();
        let mut s = Spoilers::new(full.clone());
        s.bounded_bisim(Some(100));
        assert_eq!(s.mini().states(), full.states());
    }
}
