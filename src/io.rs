//! Persisted text block format: `# NAME` headers followed by their payload.
//!
//! Mirrors the `# NAME\n<payload>\n` convention read by
//! `original_source/src/FileHandler.hpp`'s `readMember`/`readSet`/`readVecSet`
//! family: a member is one scalar on the line after its header, a set is one
//! value per line for a declared count, and a "vector of sets" is one line
//! per state holding space-separated values, or the literal `x` for an empty
//! set. Negotiate uses this format to persist the two guarantee automata it
//! converges to.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;

use crate::component::Component;
use crate::error::{NegotiationError, Result};
use crate::safety_automaton::SafetyAutomaton;

/// Read-only view over a parsed block-format document.
struct BlockReader<'a> {
    lines: Vec<&'a str>,
}

impl<'a> BlockReader<'a> {
    fn new(text: &'a str) -> Self {
        Self { lines: text.lines().collect() }
    }

    fn header_line(&self, name: &str) -> Result<usize> {
        let needle = format!("# {name}");
        self.lines
            .iter()
            .position(|l| l.trim() == needle)
            .ok_or_else(|| NegotiationError::Malformed(format!("block {name} not found")))
    }

    fn member<T: FromStr>(&self, name: &str) -> Result<T> {
        let at = self.header_line(name)?;
        let line = self
            .lines
            .get(at + 1)
            .ok_or_else(|| NegotiationError::Malformed(format!("{name}: missing value line")))?;
        line.trim()
            .parse()
            .map_err(|_| NegotiationError::Malformed(format!("{name}: could not parse {line:?}")))
    }

    /// `count` lines of one integer each.
    fn vec_usize(&self, name: &str, count: usize) -> Result<Vec<usize>> {
        let at = self.header_line(name)?;
        (0..count)
            .map(|i| {
                let line = self
                    .lines
                    .get(at + 1 + i)
                    .ok_or_else(|| NegotiationError::Malformed(format!("{name}: expected {count} rows")))?;
                line.trim()
                    .parse()
                    .map_err(|_| NegotiationError::Malformed(format!("{name}: could not parse {line:?}")))
            })
            .collect()
    }

    /// `count` lines, each a (possibly empty, marked `x`) space-separated set.
    fn vec_set(&self, name: &str, count: usize) -> Result<Vec<BTreeSet<usize>>> {
        let at = self.header_line(name)?;
        (0..count)
            .map(|i| {
                let line = self
                    .lines
                    .get(at + 1 + i)
                    .ok_or_else(|| NegotiationError::Malformed(format!("{name}: expected {count} rows")))?
                    .trim();
                if line == "x" || line.is_empty() {
                    return Ok(BTreeSet::new());
                }
                line.split_whitespace()
                    .map(|tok| {
                        tok.parse()
                            .map_err(|_| NegotiationError::Malformed(format!("{name}: could not parse {tok:?}")))
                    })
                    .collect()
            })
            .collect()
    }

    /// A single set spread over `count` lines, one value per line.
    fn set(&self, name: &str, count: usize) -> Result<BTreeSet<usize>> {
        Ok(self.vec_usize(name, count)?.into_iter().collect())
    }
}

fn write_member<T: Display>(out: &mut String, name: &str, value: T) {
    out.push_str("# ");
    out.push_str(name);
    out.push('\n');
    out.push_str(&value.to_string());
    out.push('\n');
}

fn write_vec_usize(out: &mut String, name: &str, values: &[usize]) {
    out.push_str("# ");
    out.push_str(name);
    out.push('\n');
    for v in values {
        out.push_str(&v.to_string());
        out.push('\n');
    }
}

fn write_set_lines(out: &mut String, name: &str, values: &BTreeSet<usize>) {
    out.push_str("# ");
    out.push_str(name);
    out.push('\n');
    for v in values {
        out.push_str(&v.to_string());
        out.push('\n');
    }
}

fn write_vec_set(out: &mut String, name: &str, rows: impl Iterator<Item = BTreeSet<usize>>) {
    out.push_str("# ");
    out.push_str(name);
    out.push('\n');
    for row in rows {
        if row.is_empty() {
            out.push_str("x\n");
        } else {
            let line = row.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ");
            out.push_str(&line);
            out.push('\n');
        }
    }
}

/// Parses a `Component` from its block-format serialization.
pub fn read_component(text: &str) -> Result<Component> {
    let r = BlockReader::new(text);
    let states: usize = r.member("NO_STATES")?;
    let controls: usize = r.member("NO_CONTROL_INPUTS")?;
    let disturbances: usize = r.member("NO_DIST_INPUTS")?;
    let outputs: usize = r.member("NO_OUTPUTS")?;
    let no_init: usize = r.member("NO_INIT_STATES")?;
    let init = r.set("SET_INIT", no_init)?;
    let out = r.vec_usize("STATE_TO_OUTPUT", states)?;
    let post_sets = r.vec_set("TRANSITION_POST", states * controls * disturbances)?;
    let post = post_sets.into_iter().map(|s| s.into_iter().collect()).collect();
    Component::new(states, controls, disturbances, outputs, init, out, post)
}

/// Serializes a `Component` to the block format.
pub fn write_component(c: &Component) -> String {
    let mut out = String::new();
    write_member(&mut out, "NO_STATES", c.states());
    write_member(&mut out, "NO_CONTROL_INPUTS", c.controls());
    write_member(&mut out, "NO_DIST_INPUTS", c.disturbances());
    write_member(&mut out, "NO_OUTPUTS", c.outputs());
    write_member(&mut out, "NO_INIT_STATES", c.init().len());
    write_set_lines(&mut out, "SET_INIT", c.init());
    write_vec_usize(&mut out, "STATE_TO_OUTPUT", &(0..c.states()).map(|s| c.out(s)).collect::<Vec<_>>());
    write_vec_set(
        &mut out,
        "TRANSITION_POST",
        (0..c.states())
            .flat_map(|s| (0..c.controls()).map(move |u| (s, u)))
            .flat_map(|(s, u)| (0..c.disturbances()).map(move |w| (s, u, w)))
            .map(|(s, u, w)| c.post(s, u, w).iter().copied().collect()),
    );
    out
}

/// Parses a `SafetyAutomaton` from its block-format serialization.
pub fn read_safety_automaton(text: &str) -> Result<SafetyAutomaton> {
    let r = BlockReader::new(text);
    let states: usize = r.member("NO_STATES")?;
    let inputs: usize = r.member("NO_INPUTS")?;
    let no_init: usize = r.member("NO_INIT_STATES")?;
    let init = r.set("SET_INIT", no_init)?;
    let post_sets = r.vec_set("TRANSITION_POST", states * inputs)?;
    let post = post_sets.into_iter().map(|s| s.into_iter().collect()).collect();
    SafetyAutomaton::new(states, inputs, init, post)
}

/// Serializes a `SafetyAutomaton` to the block format.
pub fn write_safety_automaton(a: &SafetyAutomaton) -> String {
    let mut out = String::new();
    write_member(&mut out, "NO_STATES", a.states());
    write_member(&mut out, "NO_INPUTS", a.inputs());
    write_member(&mut out, "NO_INIT_STATES", a.init().len());
    write_set_lines(&mut out, "SET_INIT", a.init());
    write_vec_set(
        &mut out,
        "TRANSITION_POST",
        (0..a.states())
            .flat_map(|s| (0..a.inputs()).map(move |j| (s, j)))
            .map(|(s, j)| a.post(s, j).iter().copied().collect()),
    );
    out
}

/// Reads a component's local safety-state set from a
/// `NO_SAFE_STATES`/`SET_SAFE_STATES` document.
pub fn read_safe_states(text: &str) -> Result<BTreeSet<usize>> {
    let r = BlockReader::new(text);
    let n: usize = r.member("NO_SAFE_STATES")?;
    r.set("SET_SAFE_STATES", n)
}

/// Reads a component's local Büchi-target set from a
/// `NO_TARGET_STATES`/`SET_TARGET_STATES` document.
pub fn read_target_states(text: &str) -> Result<BTreeSet<usize>> {
    let r = BlockReader::new(text);
    let n: usize = r.member("NO_TARGET_STATES")?;
    r.set("SET_TARGET_STATES", n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safety_automaton_round_trips_through_block_format() {
        let a = SafetyAutomaton::accepts_all_ctor(2);
        let text = write_safety_automaton(&a);
        let parsed = read_safety_automaton(&text).unwrap();
        assert_eq!(parsed, a);
    }

    #[test]
    fn component_round_trips_through_block_format() {
        let c = Component::new(2, 1, 1, 1, BTreeSet::from([0]), vec![0, 0], vec![vec![1], vec![0]]).unwrap();
        let text = write_component(&c);
        let parsed = read_component(&text).unwrap();
        assert_eq!(parsed.states(), c.states());
        assert_eq!(parsed.post(0, 0, 0), c.post(0, 0, 0));
        assert_eq!(parsed.post(1, 0, 0), c.post(1, 0, 0));
    }

    #[test]
    fn missing_block_is_malformed() {
        let err = read_safety_automaton("# NO_STATES\n2\n").unwrap_err();
        assert!(matches!(err, NegotiationError::Malformed(_)));
    }

    #[test]
    fn empty_row_is_written_as_x() {
        let mut post = vec![Vec::new(); 2 * 1];
        post[0] = vec![0];
        post[1] = Vec::new();
        let a = SafetyAutomaton::new(2, 1, BTreeSet::from([0]), post).unwrap();
        let text = write_safety_automaton(&a);
        assert!(text.contains("x\n"));
    }
}
