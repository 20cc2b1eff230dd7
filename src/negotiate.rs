//! Iterative-deepening negotiation between two components.
//!
//! [`Negotiate`] alternates turns between component `0` and component `1`,
//! each round computing the overall spoiling behavior (safety ⊗ liveness,
//! trimmed and minimized) for the component whose turn it is and folding it
//! into the *other* component's guarantee. Depth `k` bounds how coarse the
//! bisimulation quotient used for each round's spoiler is; when a round at
//! depth `k` makes no further progress on either side, `k` grows by one and
//! both guarantees reset to "accept everything".

use log::{debug, info};

use crate::component::Component;
use crate::config::NegotiationConfig;
use crate::error::Result;
use crate::liveness_game::LivenessGame;
use crate::monitor::{Mode, Monitor, WinFlag};
use crate::safety_automaton::SafetyAutomaton;
use crate::safety_game::SafetyGame;
use crate::spoilers::Spoilers;
use std::collections::BTreeSet;

/// Result of a full negotiation run.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Both components were sure-losing at some depth with no further
    /// progress possible: no assume-guarantee contract exists.
    ContractDoesNotExist,
    /// `max_depth` was reached, or the search otherwise gave up, without
    /// reaching either a confirmed success or a confirmed impossibility.
    Inconclusive,
    /// A mutually sure-winning pair of guarantees was found at `depth`.
    Success { depth: usize, guarantees: [SafetyAutomaton; 2] },
}

/// Per-round diagnostics, one entry per call to `compute_spoilers_overall`.
#[derive(Debug, Clone)]
pub struct RoundReport {
    pub component: usize,
    pub monitor_states: usize,
    pub safety_spoiler_states: usize,
    pub liveness_spoiler_states: usize,
    pub overall_spoiler_states: usize,
    pub k: usize,
}

/// The two finite components and their local specifications.
pub struct Negotiate {
    components: [Component; 2],
    safe_states: [BTreeSet<usize>; 2],
    target_states: [BTreeSet<usize>; 2],
    guarantee: [SafetyAutomaton; 2],
    config: NegotiationConfig,
}

impl Negotiate {
    pub fn new(
        components: [Component; 2],
        safe_states: [BTreeSet<usize>; 2],
        target_states: [BTreeSet<usize>; 2],
        config: NegotiationConfig,
    ) -> Self {
        let guarantee = [
            SafetyAutomaton::accepts_all_ctor(components[0].outputs()),
            SafetyAutomaton::accepts_all_ctor(components[1].outputs()),
        ];
        Self { components, safe_states, target_states, guarantee, config }
    }

    pub fn guarantees(&self) -> &[SafetyAutomaton; 2] {
        &self.guarantee
    }

    pub fn components(&self) -> &[Component; 2] {
        &self.components
    }

    pub fn safe_sets(&self) -> &[BTreeSet<usize>; 2] {
        &self.safe_states
    }

    pub fn target_sets(&self) -> &[BTreeSet<usize>; 2] {
        &self.target_states
    }

    /// Negotiates a contract by progressively increasing the bisimulation
    /// depth used for spoiler minimization, starting from `k = 0`, returning
    /// a per-round diagnostic trail alongside the outcome.
    pub fn iterative_deepening_search(&mut self) -> (Outcome, Vec<RoundReport>) {
        let mut k = self.config.k_start;
        let mut k_now: [isize; 2] = [-1, -1];
        let mut k_old: [isize; 2] = [-1, -1];
        let mut reports = Vec::new();

        loop {
            if let Some(max_depth) = self.config.max_depth {
                if k > max_depth {
                    info!("maximum search depth {max_depth} reached; no solution found");
                    return (Outcome::Inconclusive, reports);
                }
            }
            info!("current depth = {k}");

            match self.recursive_negotiation(k, &mut k_now, 0, 0, &mut reports) {
                Ok(true) => {
                    let outcome = Outcome::Success { depth: k, guarantees: self.guarantee.clone() };
                    return (outcome, reports);
                }
                Ok(false) => {
                    if k_now == k_old {
                        info!("spoiling-behavior search saturated; no solution found");
                        return (Outcome::ContractDoesNotExist, reports);
                    }
                    k_old = k_now;
                    k_now = [-1, -1];
                    self.guarantee = [
                        SafetyAutomaton::accepts_all_ctor(self.components[0].outputs()),
                        SafetyAutomaton::accepts_all_ctor(self.components[1].outputs()),
                    ];
                    k += self.config.bisim_step;
                }
                Err(_) => return (Outcome::Inconclusive, reports),
            }
        }
    }

    /// Alternates turns, each round updating the *other* component's
    /// guarantee from the current component's spoiling behavior, until one
    /// side is sure-losing (failure) or both are sure-winning (success).
    fn recursive_negotiation(
        &mut self,
        k: usize,
        k_act: &mut [isize; 2],
        c: usize,
        done: usize,
        reports: &mut Vec<RoundReport>,
    ) -> Result<bool> {
        let other = 1 - c;
        debug!("turn = {c}");
        let (flag, spoilers, report) = self.compute_spoilers_overall(c, k)?;
        reports.push(report);

        if flag == 0 {
            debug!("component {c} is sure losing; negotiation fails");
            Ok(false)
        } else if done == 2 {
            info!("both components are sure winning; negotiation succeeded");
            Ok(true)
        } else if flag == 2 {
            debug!("component {c} is sure winning; handing the turn to component {other}");
            self.recursive_negotiation(k, k_act, other, done + 1, reports)
        } else {
            debug!("computing spoilers for component {c}");
            let mut spoiler = Spoilers::new(spoilers);
            spoiler.bounded_bisim(Some(k));
            if k_act[c] == -1 {
                k_act[c] = spoiler.k() as isize;
            }
            let updated = SafetyAutomaton::product(&self.guarantee[other], spoiler.mini())?.trim();
            let mut final_spoilers = Spoilers::new(updated);
            final_spoilers.bounded_bisim(None);
            self.guarantee[other] = final_spoilers.mini().clone();
            self.recursive_negotiation(k, k_act, other, 0, reports)
        }
    }

    /// Computes component `c`'s overall spoiling behavior (safety spoilers
    /// product liveness spoilers, both trimmed and minimized). Returns
    /// `0` if some initial state is sure-losing, `2` if every initial state
    /// is sure-winning for both safety and liveness, `1` otherwise, along
    /// with a diagnostic report of this round's automaton sizes.
    fn compute_spoilers_overall(&self, c: usize, k: usize) -> Result<(u8, SafetyAutomaton, RoundReport)> {
        let other = 1 - c;
        let monitor = Monitor::new(&self.components[c], &self.guarantee[other], &self.guarantee[c])?;
        let monitor_states = monitor.states();
        let safety_game = SafetyGame::new(&monitor);
        let sure_safe = safety_game.solve(&self.safe_states[c], Mode::Sure);
        let maybe_safe = safety_game.solve(&self.safe_states[c], Mode::Maybe);
        let (flag1, spoilers_safety) = safety_game.find_spoilers(&sure_safe, &maybe_safe);
        if flag1 == WinFlag::LostInit {
            let report = RoundReport {
                component: c,
                monitor_states,
                safety_spoiler_states: spoilers_safety.states(),
                liveness_spoiler_states: 0,
                overall_spoiler_states: 0,
                k,
            };
            return Ok((0, SafetyAutomaton::accepts_all_ctor(self.components[c].disturbances()), report));
        }

        let mut safety_spoilers = Spoilers::new(spoilers_safety.trim());
        safety_spoilers.bounded_bisim(None);
        let safety_mini = safety_spoilers.mini().clone();

        // Build the liveness monitor over the same (component, guarantee[other],
        // guarantee[c]) triple as the safety monitor so its state indices line
        // up with `sure_safe`/`maybe_safe`, then restrict its allowed inputs by
        // the solved safety strategy: the sure strategy if every initial state
        // was already sure-winning, the maybe strategy otherwise.
        let (allowed_control, allowed_joint) = if flag1 == WinFlag::SureAllInit {
            (Some(sure_safe.as_slice()), None)
        } else {
            (None, Some(maybe_safe.as_slice()))
        };
        let live_monitor =
            Monitor::with_restrictions(&self.components[c], &self.guarantee[other], &self.guarantee[c], allowed_control, allowed_joint)?;
        let liveness_game = LivenessGame::new(&live_monitor);
        let sure_live = liveness_game.solve(&self.target_states[c], Mode::Sure);
        let maybe_live = liveness_game.solve(&self.target_states[c], Mode::Maybe);
        let (flag2, spoilers_liveness) = liveness_game.find_spoilers(&self.target_states[c], &sure_live, &maybe_live);
        if flag2 == WinFlag::LostInit {
            let report = RoundReport {
                component: c,
                monitor_states,
                safety_spoiler_states: safety_mini.states(),
                liveness_spoiler_states: spoilers_liveness.states(),
                overall_spoiler_states: 0,
                k,
            };
            return Ok((0, SafetyAutomaton::accepts_all_ctor(self.components[c].disturbances()), report));
        }

        let mut liveness_spoilers = Spoilers::new(spoilers_liveness.trim());
        liveness_spoilers.bounded_bisim(None);
        let liveness_mini = liveness_spoilers.mini().clone();

        let overall = SafetyAutomaton::product(&safety_mini, &liveness_mini)?.trim();
        let mut overall_spoilers = Spoilers::new(overall);
        overall_spoilers.bounded_bisim(None);

        let out_flag = if flag1 == WinFlag::SureAllInit && flag2 == WinFlag::SureAllInit { 2 } else { 1 };
        let report = RoundReport {
            component: c,
            monitor_states,
            safety_spoiler_states: safety_mini.states(),
            liveness_spoiler_states: liveness_mini.states(),
            overall_spoiler_states: overall_spoilers.mini().states(),
            k,
        };
        Ok((out_flag, overall_spoilers.mini().clone(), report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trivial_component() -> Component {
        Component::new(1, 1, 1, 1, BTreeSet::from([0]), vec![0], vec![vec![0]]).unwrap()
    }

    #[test]
    fn two_trivial_self_looping_components_negotiate_a_contract() {
        let comps = [trivial_component(), trivial_component()];
        let safe = [BTreeSet::from([0]), BTreeSet::from([0])];
        let target = [BTreeSet::from([0]), BTreeSet::from([0])];
        let mut negotiate = Negotiate::new(comps, safe, target, NegotiationConfig::default());
        let (outcome, reports) = negotiate.iterative_deepening_search();
        match outcome {
            Outcome::Success { depth, .. } => assert_eq!(depth, 0),
            other => panic!("expected Success, got {other:?}"),
        }
        assert!(!reports.is_empty());
    }

    #[test]
    fn max_depth_zero_still_resolves_a_trivially_winning_contract() {
        let comps = [trivial_component(), trivial_component()];
        let safe = [BTreeSet::from([0]), BTreeSet::from([0])];
        let target = [BTreeSet::from([0]), BTreeSet::from([0])];
        let config = NegotiationConfig { max_depth: Some(0), ..NegotiationConfig::default() };
        let mut negotiate = Negotiate::new(comps, safe, target, config);
        assert!(matches!(negotiate.iterative_deepening_search().0, Outcome::Success { .. }));
    }

    #[test]
    fn accessors_expose_the_inputs_unchanged() {
        let comps = [trivial_component(), trivial_component()];
        let safe = [BTreeSet::from([0]), BTreeSet::from([0])];
        let target = [BTreeSet::from([0]), BTreeSet::from([0])];
        let negotiate = Negotiate::new(comps, safe.clone(), target.clone(), NegotiationConfig::default());
        assert_eq!(negotiate.safe_sets(), &safe);
        assert_eq!(negotiate.target_sets(), &target);
        assert_eq!(negotiate.components()[0].states(), 1);
    }
}
