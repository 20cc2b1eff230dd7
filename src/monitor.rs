//! The product game arena of a component under an assumption/guarantee pair.
//!
//! A [`Monitor`] embeds `Component × Assumption × Guarantee` into one state
//! space with two absorbing sinks: index `0` is *reject_A* (the assumption
//! was violated) and index `1` is *reject_G* (the guarantee was violated).
//! Guarantee violation takes priority: if a transition would trigger both,
//! the monitor goes to *reject_G*. [`SafetyGame`](crate::safety_game::SafetyGame)
//! and [`LivenessGame`](crate::liveness_game::LivenessGame) are both defined
//! purely in terms of a monitor's `pre`/`post` arrays.

use std::collections::{BTreeSet, VecDeque};

use crate::component::Component;
use crate::error::{NegotiationError, Result};
use crate::safety_automaton::SafetyAutomaton;

pub const REJECT_A: usize = 0;
pub const REJECT_G: usize = 1;

/// Adversarial ([`Mode::Sure`]) vs cooperative ([`Mode::Maybe`]) disturbance
/// semantics, shared by [`crate::safety_game::SafetyGame`] and
/// [`crate::liveness_game::LivenessGame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Sure,
    Maybe,
}

/// Outcome flag shared by [`crate::safety_game::SafetyGame::find_spoilers`]
/// and [`crate::liveness_game::LivenessGame::find_spoilers`]: whether every
/// initial state was already sure-winning (no spoiler needed), some initial
/// state was sure-losing even cooperatively (negotiation on this branch is
/// hopeless), or a genuine partial spoiler automaton was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinFlag {
    LostInit,
    Partial,
    SureAllInit,
}

/// The product game arena. `post[addr(s,u,w)]` and `pre[addr(s,u,w)]` are
/// materialized eagerly at construction time, mirroring the dense-array
/// convention the rest of this crate uses for transition relations.
#[derive(Debug, Clone)]
pub struct Monitor {
    states: usize,
    comp_states: usize,
    assume_states: usize,
    guarantee_states: usize,
    controls: usize,
    disturbances: usize,
    init: BTreeSet<usize>,
    post: Vec<Vec<usize>>,
    pre: Vec<Vec<usize>>,
}

/// `u * disturbances + w`, the joint-action packing [`SafetyGame`](crate::safety_game::SafetyGame)
/// and [`LivenessGame`](crate::liveness_game::LivenessGame) use for their
/// `Mode::Maybe` strategy tables — the same packing `allowed_joint` below is
/// indexed with.
fn joint_index(u: usize, w: usize, disturbances: usize) -> usize {
    u * disturbances + w
}

impl Monitor {
    /// Bijection from a non-sink `(component, assumption, guarantee)` triple
    /// to its monitor state index. `assumption` and `guarantee` states must
    /// both be non-reject (`>= 1`); the `-1` shifts exclude their reject
    /// classes, and `+2` reserves the two monitor sinks.
    pub fn idx(comp: usize, assume: usize, guarantee: usize, assume_states: usize, guarantee_states: usize) -> usize {
        comp * (assume_states - 1) * (guarantee_states - 1) + (assume - 1) * (guarantee_states - 1) + (guarantee - 1) + 2
    }

    /// Builds the monitor, allowing every control and every joint action at
    /// every state (the unrestricted construction the original library uses
    /// whenever a game hasn't yet pruned the action sets).
    pub fn new(comp: &Component, assume: &SafetyAutomaton, guarantee: &SafetyAutomaton) -> Result<Self> {
        Self::with_restrictions(comp, assume, guarantee, None, None)
    }

    /// Builds the monitor, additionally pruning the per-state joint-action
    /// set by a previously solved strategy.
    ///
    /// `allowed_control[im]`, if non-empty, restricts which controls are
    /// considered at monitor state `im` regardless of disturbance (the sure
    /// strategy shape: a control choice that must work against every
    /// disturbance). `allowed_joint[im]`, if given, restricts which
    /// `(u,w)` pairs (packed via [`joint_index`]) are considered at `im` (the
    /// maybe strategy shape: a specific cooperative pair). Both vectors, when
    /// present, must have one entry per monitor state (`comp_states *
    /// (assume_states-1) * (guarantee_states-1) + 2`); an absent vector
    /// imposes no restriction at all, matching [`Monitor::new`].
    pub fn with_restrictions(
        comp: &Component,
        assume: &SafetyAutomaton,
        guarantee: &SafetyAutomaton,
        allowed_control: Option<&[BTreeSet<usize>]>,
        allowed_joint: Option<&[BTreeSet<usize>]>,
    ) -> Result<Self> {
        if comp.disturbances() != assume.inputs() {
            return Err(NegotiationError::AlphabetMismatch(format!(
                "monitor: assumption has {} inputs, component has {} disturbances",
                assume.inputs(),
                comp.disturbances()
            )));
        }
        if comp.outputs() != guarantee.inputs() {
            return Err(NegotiationError::AlphabetMismatch(format!(
                "monitor: guarantee has {} inputs, component has {} outputs",
                guarantee.inputs(),
                comp.outputs()
            )));
        }

        let comp_states = comp.states();
        let assume_states = assume.states();
        let guarantee_states = guarantee.states();
        let controls = comp.controls();
        let disturbances = comp.disturbances();
        let states = comp_states * (assume_states - 1) * (guarantee_states - 1) + 2;

        let mut init = BTreeSet::new();
        for &i in comp.init() {
            for &j in assume.init() {
                for &k in guarantee.init() {
                    init.insert(Self::idx(i, j, k, assume_states, guarantee_states));
                }
            }
        }

        let addr = |s: usize, u: usize, w: usize| (s * controls + u) * disturbances + w;
        let mut post = vec![Vec::new(); states * controls * disturbances];
        let mut pre = vec![Vec::new(); states * controls * disturbances];

        for ic in 0..comp_states {
            for ia in 1..assume_states {
                for ig in 1..guarantee_states {
                    let im = Self::idx(ic, ia, ig, assume_states, guarantee_states);
                    let control_restriction = allowed_control.map(|v| &v[im]).filter(|s| !s.is_empty());
                    for u in 0..controls {
                        if let Some(allowed) = control_restriction {
                            if !allowed.contains(&u) {
                                continue;
                            }
                        }
                        for w in 0..disturbances {
                            if let Some(v) = allowed_joint {
                                if !v[im].contains(&joint_index(u, w, disturbances)) {
                                    continue;
                                }
                            }
                            let a_post = assume.post(ia, w);
                            if a_post.is_empty() {
                                continue;
                            }
                            let is_a_reject = a_post.contains(&0);
                            let mut succs = BTreeSet::new();
                            for &ic2 in comp.post(ic, u, w) {
                                let o = comp.out(ic2);
                                let g_post = guarantee.post(ig, o);
                                if g_post.is_empty() {
                                    continue;
                                }
                                let is_g_reject = g_post.contains(&0);
                                if is_g_reject {
                                    succs.insert(REJECT_G);
                                    continue;
                                }
                                if is_a_reject {
                                    succs.insert(REJECT_A);
                                    continue;
                                }
                                for &ia2 in a_post {
                                    for &ig2 in g_post {
                                        succs.insert(Self::idx(ic2, ia2, ig2, assume_states, guarantee_states));
                                    }
                                }
                            }
                            let cell = addr(im, u, w);
                            for &s2 in &succs {
                                pre[addr(s2, u, w)].push(im);
                            }
                            post[cell] = succs.into_iter().collect();
                        }
                    }
                }
            }
        }

        for sink in [REJECT_A, REJECT_G] {
            for u in 0..controls {
                for w in 0..disturbances {
                    post[addr(sink, u, w)] = vec![sink];
                    pre[addr(sink, u, w)].push(sink);
                }
            }
        }

        Ok(Self {
            states,
            comp_states,
            assume_states,
            guarantee_states,
            controls,
            disturbances,
            init,
            post,
            pre,
        })
    }

    pub fn states(&self) -> usize {
        self.states
    }

    pub fn comp_states(&self) -> usize {
        self.comp_states
    }

    pub fn assume_states(&self) -> usize {
        self.assume_states
    }

    pub fn guarantee_states(&self) -> usize {
        self.guarantee_states
    }

    pub fn controls(&self) -> usize {
        self.controls
    }

    pub fn disturbances(&self) -> usize {
        self.disturbances
    }

    pub fn init(&self) -> &BTreeSet<usize> {
        &self.init
    }

    fn addr(&self, s: usize, u: usize, w: usize) -> usize {
        (s * self.controls + u) * self.disturbances + w
    }

    pub fn post(&self, s: usize, u: usize, w: usize) -> &[usize] {
        &self.post[self.addr(s, u, w)]
    }

    pub fn pre(&self, s: usize, u: usize, w: usize) -> &[usize] {
        &self.pre[self.addr(s, u, w)]
    }

    pub fn no_post(&self, s: usize, u: usize, w: usize) -> usize {
        self.post(s, u, w).len()
    }

    /// Lifts a component safe set `S` into the monitor: `(s,a,g)` for every
    /// `s ∈ S`, every non-reject `a`, every non-reject `g`, plus *reject_A*
    /// itself (safe by definition — assumption violations are the other
    /// component's fault, not this monitor's).
    pub fn lift_safe_set(&self, safe_component_states: &BTreeSet<usize>) -> BTreeSet<usize> {
        let mut lifted = BTreeSet::from([REJECT_A]);
        for &s in safe_component_states {
            for a in 1..self.assume_states {
                for g in 1..self.guarantee_states {
                    lifted.insert(Self::idx(s, a, g, self.assume_states, self.guarantee_states));
                }
            }
        }
        lifted
    }

    /// BFS of all states reachable from init via any joint action.
    pub fn reachable_set_from_init(&self) -> BTreeSet<usize> {
        let mut seen: BTreeSet<usize> = self.init.iter().copied().collect();
        let mut queue: VecDeque<usize> = seen.iter().copied().collect();
        while let Some(s) = queue.pop_front() {
            for u in 0..self.controls {
                for w in 0..self.disturbances {
                    for &s2 in self.post(s, u, w) {
                        if seen.insert(s2) {
                            queue.push_back(s2);
                        }
                    }
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trivial_component() -> Component {
        // 1 state, 1 control, 1 disturbance, 1 output, self-loop.
        Component::new(1, 1, 1, 1, BTreeSet::from([0]), vec![0], vec![vec![0]]).unwrap()
    }

    #[test]
    fn rejects_disturbance_alphabet_mismatch() {
        let comp = trivial_component();
        let assume = SafetyAutomaton::accepts_all_ctor(2);
        let guarantee = SafetyAutomaton::accepts_all_ctor(1);
        let err = Monitor::new(&comp, &assume, &guarantee).unwrap_err();
        assert!(matches!(err, NegotiationError::AlphabetMismatch(_)));
    }

    #[test]
    fn universal_assumption_and_guarantee_give_permissive_monitor() {
        let comp = trivial_component();
        let assume = SafetyAutomaton::accepts_all_ctor(1);
        let guarantee = SafetyAutomaton::accepts_all_ctor(1);
        let monitor = Monitor::new(&comp, &assume, &guarantee).unwrap();
        assert_eq!(monitor.states(), 1 * 1 * 1 + 2);
        assert!(!monitor.init().contains(&REJECT_A));
        assert!(!monitor.init().contains(&REJECT_G));
        let succ = monitor.post(*monitor.init().iter().next().unwrap(), 0, 0);
        assert_eq!(succ.len(), 1);
        assert_ne!(succ[0], REJECT_A);
        assert_ne!(succ[0], REJECT_G);
    }

    #[test]
    fn sinks_are_absorbing() {
        let comp = trivial_component();
        let assume = SafetyAutomaton::accepts_all_ctor(1);
        let guarantee = SafetyAutomaton::accepts_all_ctor(1);
        let monitor = Monitor::new(&comp, &assume, &guarantee).unwrap();
        assert_eq!(monitor.post(REJECT_A, 0, 0), &[REJECT_A]);
        assert_eq!(monitor.post(REJECT_G, 0, 0), &[REJECT_G]);
    }

    #[test]
    fn guarantee_violation_has_priority() {
        // Assumption rejects on the only disturbance; guarantee also rejects
        // on the only output; expect REJECT_G, not REJECT_A.
        let comp = trivial_component();
        let mut assume_post = vec![Vec::new(); 2 * 1];
        assume_post[0] = vec![0];
        assume_post[1] = vec![0];
        let assume = SafetyAutomaton::new(2, 1, BTreeSet::from([1]), assume_post).unwrap();
        let mut guarantee_post = vec![Vec::new(); 2 * 1];
        guarantee_post[0] = vec![0];
        guarantee_post[1] = vec![0];
        let guarantee = SafetyAutomaton::new(2, 1, BTreeSet::from([1]), guarantee_post).unwrap();
        let monitor = Monitor::new(&comp, &assume, &guarantee).unwrap();
        let init_state = *monitor.init().iter().next().unwrap();
        assert_eq!(monitor.post(init_state, 0, 0), &[REJECT_G]);
    }

    #[test]
    fn lift_safe_set_always_includes_reject_a() {
        let comp = trivial_component();
        let assume = SafetyAutomaton::accepts_all_ctor(1);
        let guarantee = SafetyAutomaton::accepts_all_ctor(1);
        let monitor = Monitor::new(&comp, &assume, &guarantee).unwrap();
        let lifted = monitor.lift_safe_set(&BTreeSet::from([0]));
        assert!(lifted.contains(&REJECT_A));
    }

    #[test]
    fn reachable_set_from_init_is_a_superset_of_init() {
        let comp = trivial_component();
        let assume = SafetyAutomaton::accepts_all_ctor(1);
        let guarantee = SafetyAutomaton::accepts_all_ctor(1);
        let monitor = Monitor::new(&comp, &assume, &guarantee).unwrap();
        let reachable = monitor.reachable_set_from_init();
        assert!(monitor.init().is_subset(&reachable));
    }
}
