//! Sure/maybe safety solving and safety-spoiler extraction on a [`Monitor`].
//!
//! The algorithm is the attractor-based safety-game solver from SCOTS,
//! adapted to monitors that carry a dedicated *reject_A* escape: disturbance
//! inputs that are "friendly" — i.e. provably force the opponent into an
//! assumption violation rather than a genuine loss — are tracked in a
//! separate outer fixpoint and excluded from the inner attractor.

use std::collections::{BTreeSet, VecDeque};

use crate::monitor::{Mode, Monitor, WinFlag, REJECT_A, REJECT_G};
use crate::safety_automaton::SafetyAutomaton;

/// A safety game played on a [`Monitor`]: reach avoid *reject_G* while the
/// assumption automaton is permitted to force *reject_A* for free.
pub struct SafetyGame<'m> {
    monitor: &'m Monitor,
}

fn addr_uw(u: usize, w: usize, disturbances: usize) -> usize {
    u * disturbances + w
}

impl<'m> SafetyGame<'m> {
    pub fn new(monitor: &'m Monitor) -> Self {
        Self { monitor }
    }

    pub fn monitor(&self) -> &Monitor {
        self.monitor
    }

    fn is_dead_end(&self, s: usize) -> bool {
        let m = self.monitor;
        (0..m.controls()).all(|u| (0..m.disturbances()).all(|w| m.no_post(s, u, w) == 0))
    }

    /// `D[s]` after solving: for [`Mode::Sure`] a set of control indices,
    /// for [`Mode::Maybe`] a set of joint `u*disturbances+w` indices.
    pub fn solve(&self, safe_component_states: &BTreeSet<usize>, mode: Mode) -> Vec<BTreeSet<usize>> {
        let m = self.monitor;
        let monitor_safe_states = m.lift_safe_set(safe_component_states);

        let mut d: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); m.states()];
        let mut e: BTreeSet<usize> = BTreeSet::from([REJECT_G]);
        let mut q: VecDeque<usize> = VecDeque::from([REJECT_G]);

        match mode {
            Mode::Sure => d[REJECT_A] = (0..m.controls()).collect(),
            Mode::Maybe => {
                d[REJECT_A] = (0..m.controls())
                    .flat_map(|u| (0..m.disturbances()).map(move |w| addr_uw(u, w, m.disturbances())))
                    .collect()
            }
        }

        for i in 2..m.states() {
            if !monitor_safe_states.contains(&i) || self.is_dead_end(i) {
                q.push_back(i);
                e.insert(i);
                continue;
            }
            match mode {
                Mode::Sure => {
                    for u in 0..m.controls() {
                        if (0..m.disturbances()).any(|w| m.no_post(i, u, w) != 0) {
                            d[i].insert(u);
                        }
                    }
                }
                Mode::Maybe => {
                    for u in 0..m.controls() {
                        for w in 0..m.disturbances() {
                            if m.no_post(i, u, w) != 0 {
                                d[i].insert(addr_uw(u, w, m.disturbances()));
                            }
                        }
                    }
                }
            }
        }

        match mode {
            Mode::Maybe => {
                Self::attractor_pass(m, &mut q, &mut d, &mut e, &[], mode);
            }
            Mode::Sure => {
                let mut friendly_dist: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); m.states()];
                let mut friendly_dist_seen: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); m.states()];
                let mut assumption_frontier: BTreeSet<usize> = BTreeSet::from([REJECT_A]);
                let d_old = d.clone();
                let mut q_old: VecDeque<usize> = q.clone();

                loop {
                    let ww = std::mem::take(&mut assumption_frontier);
                    let mut fixpoint_reached = true;
                    for &i in &ww {
                        for k in 0..m.disturbances() {
                            for j in 0..m.controls() {
                                for &i2 in m.pre(i, j, k) {
                                    if friendly_dist_seen[i2].contains(&k) {
                                        continue;
                                    }
                                    let mut is_friendly = false;
                                    for j2 in 0..m.controls() {
                                        is_friendly = m.post(i2, j2, k).iter().all(|p| !e.contains(p));
                                        if is_friendly {
                                            break;
                                        }
                                    }
                                    if is_friendly {
                                        friendly_dist[i2].insert(k);
                                        assumption_frontier.insert(i2);
                                        friendly_dist_seen[i2].insert(k);
                                        fixpoint_reached = false;
                                    }
                                }
                            }
                        }
                    }

                    d = d_old.clone();
                    q = q_old.clone();
                    Self::attractor_pass(m, &mut q, &mut d, &mut e, &friendly_dist, mode);

                    if fixpoint_reached {
                        break;
                    }

                    q = q_old.clone();
                    for i in 0..m.states() {
                        if assumption_frontier.contains(&i) {
                            friendly_dist[i].clear();
                            if e.contains(&i) {
                                q.push_back(i);
                            } else {
                                assumption_frontier.remove(&i);
                            }
                        }
                    }
                    q_old = q.clone();
                }
                debug_assert!(
                    friendly_dist_seen.iter().enumerate().all(|(i, seen)| friendly_dist[i].is_subset(seen)),
                    "friendly_dist must only ever grow across outer-loop iterations"
                );
            }
        }
        d
    }

    /// Backward attractor fixpoint shared by both modes. `friendly` (sure
    /// mode only) holds, per state, the disturbances that route around the
    /// inner attractor because they provably force *reject_A*.
    fn attractor_pass(
        m: &Monitor,
        q: &mut VecDeque<usize>,
        d: &mut [BTreeSet<usize>],
        e: &mut BTreeSet<usize>,
        friendly: &[BTreeSet<usize>],
        mode: Mode,
    ) {
        while let Some(x) = q.pop_front() {
            for j in 0..m.controls() {
                for k in 0..m.disturbances() {
                    for &p in m.pre(x, j, k) {
                        if mode == Mode::Sure && !friendly.is_empty() && friendly[p].contains(&k) {
                            continue;
                        }
                        let removed = match mode {
                            Mode::Sure => d[p].remove(&j),
                            Mode::Maybe => d[p].remove(&addr_uw(j, k, m.disturbances())),
                        };
                        if removed && d[p].is_empty() && !e.contains(&p) {
                            q.push_back(p);
                            e.insert(p);
                        }
                    }
                }
            }
        }
    }

    /// Extracts the safety-spoiler automaton over the disturbance alphabet
    /// from solved `sure_win`/`maybe_win` tables.
    pub fn find_spoilers(
        &self,
        sure_win: &[BTreeSet<usize>],
        maybe_win: &[BTreeSet<usize>],
    ) -> (WinFlag, SafetyAutomaton) {
        let m = self.monitor;

        if m.init().iter().all(|&i| !sure_win[i].is_empty()) {
            return (WinFlag::SureAllInit, SafetyAutomaton::accepts_all_ctor(m.disturbances()));
        }
        if m.init().iter().any(|&i| maybe_win[i].is_empty()) {
            return (WinFlag::LostInit, SafetyAutomaton::accepts_all_ctor(m.disturbances()));
        }

        let reachable = m.reachable_set_from_init();
        let mut new_state_ind = vec![0usize; m.states()];
        new_state_ind[REJECT_A] = 1;
        new_state_ind[REJECT_G] = 0;
        let mut no_new_states = 2usize;
        for q_ in 2..m.states() {
            if !maybe_win[q_].is_empty() && reachable.contains(&q_) {
                new_state_ind[q_] = no_new_states;
                no_new_states += 1;
            }
        }

        let init = m.init().iter().map(|&i| new_state_ind[i]).collect();
        let mut post = vec![BTreeSet::new(); no_new_states * m.disturbances()];
        for k in 0..m.disturbances() {
            post[0 * m.disturbances() + k].insert(0);
            post[1 * m.disturbances() + k].insert(1);
        }

        for q_ in 2..m.states() {
            if maybe_win[q_].is_empty() || !reachable.contains(&q_) {
                continue;
            }
            let ns = new_state_ind[q_];
            if !sure_win[q_].is_empty() {
                for &u in &sure_win[q_] {
                    for w in 0..m.disturbances() {
                        for &t in m.post(q_, u, w) {
                            post[ns * m.disturbances() + w].insert(new_state_ind[t]);
                        }
                    }
                }
            } else {
                for u in 0..m.controls() {
                    let admissible = (0..m.disturbances()).any(|w| maybe_win[q_].contains(&addr_uw(u, w, m.disturbances())));
                    if !admissible {
                        continue;
                    }
                    for w in 0..m.disturbances() {
                        if maybe_win[q_].contains(&addr_uw(u, w, m.disturbances())) {
                            for &t in m.post(q_, u, w) {
                                post[ns * m.disturbances() + w].insert(new_state_ind[t]);
                            }
                        } else {
                            post[ns * m.disturbances() + w].insert(0);
                        }
                    }
                }
            }
        }

        let post = post.into_iter().map(|s| s.into_iter().collect()).collect();
        let automaton = SafetyAutomaton::new(no_new_states, m.disturbances(), init, post)
            .expect("spoiler construction is always well-formed by construction");
        (WinFlag::Partial, automaton)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;

    fn trivial_component() -> Component {
        Component::new(1, 1, 1, 1, BTreeSet::from([0]), vec![0], vec![vec![0]]).unwrap()
    }

    #[test]
    fn trivial_self_loop_is_sure_winning() {
        let comp = trivial_component();
        let assume = SafetyAutomaton::accepts_all_ctor(1);
        let guarantee = SafetyAutomaton::accepts_all_ctor(1);
        let monitor = Monitor::new(&comp, &assume, &guarantee).unwrap();
        let game = SafetyGame::new(&monitor);
        let sure = game.solve(&BTreeSet::from([0]), Mode::Sure);
        for &i in monitor.init() {
            assert!(!sure[i].is_empty());
        }
    }

    #[test]
    fn sure_subset_of_maybe() {
        let comp = trivial_component();
        let assume = SafetyAutomaton::accepts_all_ctor(1);
        let guarantee = SafetyAutomaton::accepts_all_ctor(1);
        let monitor = Monitor::new(&comp, &assume, &guarantee).unwrap();
        let game = SafetyGame::new(&monitor);
        let sure = game.solve(&BTreeSet::from([0]), Mode::Sure);
        let maybe = game.solve(&BTreeSet::from([0]), Mode::Maybe);
        for &i in monitor.init() {
            if !sure[i].is_empty() {
                assert!(!maybe[i].is_empty());
            }
        }
    }

    #[test]
    fn all_init_sure_winning_gives_universal_spoiler() {
        let comp = trivial_component();
        let assume = SafetyAutomaton::accepts_all_ctor(1);
        let guarantee = SafetyAutomaton::accepts_all_ctor(1);
        let monitor = Monitor::new(&comp, &assume, &guarantee).unwrap();
        let game = SafetyGame::new(&monitor);
        let sure = game.solve(&BTreeSet::from([0]), Mode::Sure);
        let maybe = game.solve(&BTreeSet::from([0]), Mode::Maybe);
        let (flag, spoilers) = game.find_spoilers(&sure, &maybe);
        assert_eq!(flag, WinFlag::SureAllInit);
        assert_eq!(spoilers.states(), 2);
    }

    #[test]
    fn empty_safe_set_loses_from_init() {
        let comp = trivial_component();
        let assume = SafetyAutomaton::accepts_all_ctor(1);
        let guarantee = SafetyAutomaton::accepts_all_ctor(1);
        let monitor = Monitor::new(&comp, &assume, &guarantee).unwrap();
        let game = SafetyGame::new(&monitor);
        let sure = game.solve(&BTreeSet::new(), Mode::Sure);
        let maybe = game.solve(&BTreeSet::new(), Mode::Maybe);
        let (flag, _) = game.find_spoilers(&sure, &maybe);
        assert_eq!(flag, WinFlag::LostInit);
    }
}
