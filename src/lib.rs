//! Assume-guarantee contract negotiation between two finite reactive
//! components.
//!
//! Each component is a finite nondeterministic transition system driven by
//! control actions it chooses and disturbance actions its environment
//! chooses. Two components rarely satisfy their local safety and liveness
//! specs under arbitrary environments, so [`negotiate::Negotiate`]
//! iteratively synthesizes a pair of safety-language contracts — an
//! assumption each component may rely on about its disturbance stream, and a
//! guarantee it offers back as its output stream — such that one's
//! guarantee is exactly the other's assumption and, under that pair, both
//! components have winning strategies for safety intersected with Büchi
//! liveness.
//!
//! Module layout, leaves first: [`component`] and [`safety_automaton`] are
//! pure data/automata types; [`spoilers`] minimizes a safety automaton by
//! bounded bisimulation; [`monitor`] embeds a component and its
//! assumption/guarantee pair into a two-player game arena; [`safety_game`]
//! and [`liveness_game`] solve that arena and extract spoiling behavior;
//! [`negotiate`] orchestrates the alternating search. [`io`] and [`config`]
//! are ambient: persisted text I/O and tunables, respectively.

pub mod component;
pub mod config;
pub mod error;
pub mod io;
pub mod liveness_game;
pub mod monitor;
pub mod negotiate;
pub mod safety_automaton;
pub mod safety_game;
pub mod spoilers;

pub use component::Component;
pub use config::NegotiationConfig;
pub use error::{NegotiationError, Result};
pub use liveness_game::LivenessGame;
pub use monitor::{Mode, Monitor, WinFlag};
pub use negotiate::{Negotiate, Outcome, RoundReport};
pub use safety_automaton::SafetyAutomaton;
pub use safety_game::SafetyGame;
pub use spoilers::Spoilers;
