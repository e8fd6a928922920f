//! Lindenmayer system: grammar-driven structure generation.
//!
//! The generator rewrites an axiom string through a rule set for a number of
//! iterations, then interprets the result as a turtle program to produce a
//! forest of [`Ray`]s: a geometry-free skeleton of directions and lengths
//! that the structure stage turns into branches, one ray per branch.
//!
//! Symbol set:
//! - `F` — advance and record a ray
//! - `+` / `-` — add / subtract the turn angle
//! - `&` / `%` — add / subtract the pitch angle
//! - `\` / `/` — add / subtract the roll angle
//! - `>` / `<` — shrink / grow the segment length by the length-growth delta
//! - `)` / `(` — grow / shrink the three pending angles by their growth deltas
//! - `[` / `]` — push / pop the turtle frame (fork point)
//! - `!` — negate the pending turn angle
//! - `|` — flip the heading 180 degrees about the up axis

use std::collections::HashMap;

use glam::{EulerRot, Quat, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How a rule's probability participates in selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbabilityMode {
    /// Shares the probability mass left over by `Fixed` rules evenly.
    Fill,
    /// Uses its own probability value as-is.
    Fixed,
}

/// A rewrite rule for one symbol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub symbol: char,
    pub replacement: String,
    pub enabled: bool,
    /// Probability of occurrence for `Fixed` mode, `0..=1`.
    pub probability: f32,
    pub probability_mode: ProbabilityMode,
    /// First iteration the rule applies at.
    pub from_iteration: usize,
    /// Last iteration the rule applies at; `None` means unbounded.
    pub to_iteration: Option<usize>,
}

impl Rule {
    pub fn new(symbol: char, replacement: impl Into<String>) -> Self {
        Self {
            symbol,
            replacement: replacement.into(),
            enabled: true,
            probability: 1.0,
            probability_mode: ProbabilityMode::Fill,
            from_iteration: 0,
            to_iteration: None,
        }
    }

    fn applies_at(&self, iteration: usize) -> bool {
        self.enabled
            && iteration >= self.from_iteration
            && self.to_iteration.is_none_or(|to| iteration <= to)
    }
}

/// A ray emitted by the turtle: direction, length and nested forks.
///
/// Produced fresh by each generation and never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Ray {
    pub direction: Vec3,
    pub length: f32,
    pub children: Vec<Ray>,
}

/// The L-System generator configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LSystem {
    pub axiom: String,
    pub rules: HashMap<char, Vec<Rule>>,
    pub iterations: usize,
    /// When `false`, pending angles reset after every emitted ray.
    pub accumulative: bool,
    /// Collapse identical sibling subtrees before interpretation.
    pub remove_overlaps: bool,
    /// Base segment length.
    pub length: f32,
    /// Relative length change applied by the `>`/`<` symbols.
    pub length_growth: f32,
    /// Angles in degrees, with their growth deltas for `)`/`(`.
    pub turn_angle: f32,
    pub turn_angle_growth: f32,
    pub pitch_angle: f32,
    pub pitch_angle_growth: f32,
    pub roll_angle: f32,
    pub roll_angle_growth: f32,
    /// Up axis the turtle starts along.
    pub upward: Vec3,
}

impl Default for LSystem {
    fn default() -> Self {
        Self {
            axiom: "F".to_string(),
            rules: HashMap::new(),
            iterations: 3,
            accumulative: false,
            remove_overlaps: true,
            length: 1.0,
            length_growth: -1.5,
            turn_angle: 30.0,
            turn_angle_growth: 0.0,
            pitch_angle: 30.0,
            pitch_angle_growth: 0.0,
            roll_angle: 30.0,
            roll_angle_growth: 0.0,
            upward: Vec3::Y,
        }
    }
}

/// Turtle frame while interpreting the rewritten string.
#[derive(Clone, Debug)]
struct TurtleState {
    length: f32,
    turn: f32,
    pitch: f32,
    roll: f32,
    direction: Vec3,
}

impl TurtleState {
    fn reset_angles(&mut self) {
        self.turn = 0.0;
        self.pitch = 0.0;
        self.roll = 0.0;
    }
}

impl LSystem {
    /// Adds a rule to the set for its symbol, keeping list order.
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.entry(rule.symbol).or_default().push(rule);
    }

    /// Rewrites the axiom through `iterations` passes and returns the final
    /// symbol string (after overlap removal when enabled).
    ///
    /// An empty axiom yields an empty string; zero iterations yield the raw
    /// axiom.
    pub fn rewrite(&self, rng: &mut impl Rng) -> String {
        let mut input = self.axiom.clone();
        for iteration in 0..self.iterations {
            input = self.replace(&input, iteration, rng);
        }
        if self.remove_overlaps {
            input = simplify(&input);
        }
        input
    }

    /// One simultaneous replacement pass over `s` for `iteration`.
    fn replace(&self, s: &str, iteration: usize, rng: &mut impl Rng) -> String {
        let mut out = String::with_capacity(s.len() * 2);
        for c in s.chars() {
            match self.select_rule(c, iteration, rng) {
                Some(rule) => out.push_str(&rule.replacement),
                None => out.push(c),
            }
        }
        out
    }

    /// Picks the rule to apply for `symbol` at `iteration`.
    ///
    /// Candidates are the enabled rules whose iteration window contains
    /// `iteration`. Fixed-probability candidates are considered first,
    /// ordered by descending probability; fill candidates split the leftover
    /// probability mass evenly. A single uniform draw selects the winner, so
    /// a lone always-applicable rule wins deterministically.
    fn select_rule(&self, symbol: char, iteration: usize, rng: &mut impl Rng) -> Option<&Rule> {
        let rules = self.rules.get(&symbol)?;
        let mut candidates: Vec<&Rule> =
            rules.iter().filter(|r| r.applies_at(iteration)).collect();
        if candidates.is_empty() {
            return None;
        }

        let fixed_mass: f32 = candidates
            .iter()
            .filter(|r| r.probability_mode == ProbabilityMode::Fixed)
            .map(|r| r.probability)
            .sum();
        let fill_count = candidates
            .iter()
            .filter(|r| r.probability_mode == ProbabilityMode::Fill)
            .count();
        let fill_probability = if fill_count > 0 {
            (1.0 - fixed_mass) / fill_count as f32
        } else {
            0.0
        };

        let key = |r: &Rule| match r.probability_mode {
            ProbabilityMode::Fixed => (0, -r.probability),
            ProbabilityMode::Fill => (1, 0.0),
        };
        candidates.sort_by(|a, b| {
            key(a).partial_cmp(&key(b)).unwrap_or(std::cmp::Ordering::Equal)
        });

        let p: f32 = rng.random();
        let mut accum = 0.0;
        for rule in candidates {
            let probability = match rule.probability_mode {
                ProbabilityMode::Fixed => rule.probability,
                ProbabilityMode::Fill => fill_probability,
            };
            if p >= accum && p <= accum + probability {
                return Some(rule);
            }
            accum += probability;
        }
        None
    }

    /// Rewrites the axiom and interprets the result into a forest of rays.
    ///
    /// Top-level rays become tree roots; rays recorded while a frame was
    /// pushed become children at the fork point. Given the same seed state
    /// and the same parameters, the output is bit-identical.
    pub fn generate(&self, rng: &mut impl Rng) -> Vec<Ray> {
        let input = self.rewrite(rng);
        self.interpret(&input)
    }

    /// Interprets an already-rewritten symbol string.
    pub fn interpret(&self, input: &str) -> Vec<Ray> {
        // Arena of rays with child index lists; nested `Ray`s are assembled
        // at the end to avoid aliasing a parent while appending children.
        struct Node {
            direction: Vec3,
            length: f32,
            children: Vec<usize>,
        }
        let mut nodes: Vec<Node> = Vec::new();
        let mut roots: Vec<usize> = Vec::new();

        let mut state = TurtleState {
            length: self.length,
            turn: 0.0,
            pitch: 0.0,
            roll: 0.0,
            direction: self.upward,
        };
        let mut parent: Option<usize> = None;
        let mut state_stack: Vec<TurtleState> = Vec::new();
        let mut parent_stack: Vec<Option<usize>> = Vec::new();

        for c in input.chars() {
            match c {
                'F' => {
                    let rotation = Quat::from_euler(
                        EulerRot::YXZ,
                        state.turn.to_radians(),
                        state.pitch.to_radians(),
                        state.roll.to_radians(),
                    );
                    let direction = (rotation * state.direction).normalize_or_zero();
                    let idx = nodes.len();
                    nodes.push(Node {
                        direction,
                        length: state.length,
                        children: Vec::new(),
                    });
                    match parent {
                        None => roots.push(idx),
                        Some(p) => nodes[p].children.push(idx),
                    }
                    parent = Some(idx);
                    if !self.accumulative {
                        state.reset_angles();
                    }
                }
                '+' => state.turn += self.turn_angle,
                '-' => state.turn -= self.turn_angle,
                '&' => state.pitch += self.pitch_angle,
                '%' => state.pitch -= self.pitch_angle,
                '\\' => state.roll += self.roll_angle,
                '/' => state.roll -= self.roll_angle,
                '>' => state.length *= 1.0 - self.length_growth,
                '<' => state.length *= 1.0 + self.length_growth,
                ')' => {
                    state.turn *= 1.0 + self.turn_angle_growth;
                    state.pitch *= 1.0 + self.pitch_angle_growth;
                    state.roll *= 1.0 + self.roll_angle_growth;
                }
                '(' => {
                    state.turn *= 1.0 - self.turn_angle_growth;
                    state.pitch *= 1.0 - self.pitch_angle_growth;
                    state.roll *= 1.0 - self.roll_angle_growth;
                }
                '[' => {
                    state_stack.push(state.clone());
                    parent_stack.push(parent);
                }
                ']' => {
                    if let (Some(s), Some(p)) = (state_stack.pop(), parent_stack.pop()) {
                        state = s;
                        parent = p;
                    }
                }
                '!' => state.turn = -state.turn,
                '|' => {
                    state.direction =
                        Quat::from_axis_angle(self.upward, std::f32::consts::PI) * state.direction;
                }
                _ => {}
            }
        }

        fn assemble(nodes: &[Node], idx: usize) -> Ray {
            Ray {
                direction: nodes[idx].direction,
                length: nodes[idx].length,
                children: nodes[idx].children.iter().map(|&c| assemble(nodes, c)).collect(),
            }
        }
        roots.iter().map(|&r| assemble(&nodes, r)).collect()
    }
}

/// Collapses identical sibling subtrees.
///
/// Siblings are keyed by the symbol run leading to their `F` (including any
/// turn/roll/growth prefix), nested per fork, so `F[/F][/F]` becomes a
/// single `/F` child. The output wraps every subtree in brackets, which the
/// interpreter treats the same as the unwrapped form.
fn simplify(input: &str) -> String {
    // Arena trie: (key, child indices); node 0 is the root.
    let mut nodes: Vec<(String, Vec<usize>)> = vec![(String::new(), Vec::new())];
    let mut current = 0usize;
    let mut stack: Vec<usize> = Vec::new();
    let mut accum = String::new();

    for c in input.chars() {
        match c {
            'F' => {
                accum.push('F');
                let existing = nodes[current]
                    .1
                    .iter()
                    .copied()
                    .find(|&i| nodes[i].0 == accum);
                let next = match existing {
                    Some(i) => i,
                    None => {
                        let i = nodes.len();
                        nodes.push((accum.clone(), Vec::new()));
                        nodes[current].1.push(i);
                        i
                    }
                };
                current = next;
                accum.clear();
            }
            '[' => {
                stack.push(current);
                accum.clear();
            }
            ']' => {
                current = stack.pop().unwrap_or(0);
                accum.clear();
            }
            _ => accum.push(c),
        }
    }

    fn write(nodes: &[(String, Vec<usize>)], id: usize, out: &mut String) {
        for &child in &nodes[id].1 {
            out.push('[');
            out.push_str(&nodes[child].0);
            write(nodes, child, out);
            out.push(']');
        }
    }
    let mut out = String::with_capacity(input.len());
    write(&nodes, 0, &mut out);
    out
}
