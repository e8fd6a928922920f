//! The stage graph: an ordered, singly linked chain of stages from one
//! Source to one Sink.
//!
//! The host UI builds the graph by adding stages; insertion keeps the chain
//! sorted by position weight. Validation never panics or throws: it returns
//! a [`GraphState`] and a non-valid state simply makes processing refuse to
//! run.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::log::LogQueue;
use crate::stage::{ConnectionRole, Stage, StageKind};
use crate::types::StageId;

/// Outcome of validating a graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphState {
    Valid,
    Empty,
    NoSource,
    NoSink,
    /// A unique stage class appears more than once.
    MultiElement,
    /// Stages form more than one pipeline.
    MultiplePipelines,
    /// A stage link is dangling or cyclic.
    InvalidConnection,
}

impl std::fmt::Display for GraphState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            GraphState::Valid => "pipeline is valid",
            GraphState::Empty => "pipeline has no stages",
            GraphState::NoSource => "pipeline has no source stage",
            GraphState::NoSink => "pipeline has no sink stage",
            GraphState::MultiElement => "a unique stage class appears more than once",
            GraphState::MultiplePipelines => "stages form more than one pipeline",
            GraphState::InvalidConnection => "a stage link is dangling or cyclic",
        };
        f.write_str(text)
    }
}

/// The stage chain plus the run-scoped PRNG and log queue.
#[derive(Debug)]
pub struct StageGraph {
    stages: Vec<Stage>,
    /// Seed for the current run; refreshed by [`StageGraph::generate_seed`].
    pub seed: u64,
    pub(crate) rng: ChaCha8Rng,
    pub log: LogQueue,
}

impl StageGraph {
    pub fn new(seed: u64) -> Self {
        Self {
            stages: Vec::new(),
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            log: LogQueue::default(),
        }
    }

    /// Adds a stage, splicing it into the chain in position-weight order,
    /// and returns its id.
    pub fn add_stage(&mut self, kind: StageKind) -> StageId {
        let id = self.stages.len();
        let weight = kind.position_weight();
        let mut stage = Stage::new(id, kind);

        // Find the last chained stage whose weight does not exceed the new
        // one; the new stage splices in right after it.
        let prev = self
            .walk()
            .into_iter()
            .take_while(|&s| self.stages[s].position_weight() <= weight)
            .last();

        match prev {
            Some(prev) => {
                let next = self.stages[prev].sink;
                stage.src = Some(prev);
                stage.sink = next;
                self.stages[prev].sink = Some(id);
                if let Some(next) = next {
                    self.stages[next].src = Some(id);
                }
            }
            None => {
                // New head of the chain.
                let old_head = self.chain_head();
                stage.sink = old_head;
                if let Some(head) = old_head {
                    self.stages[head].src = Some(id);
                }
            }
        }
        self.stages.push(stage);
        id
    }

    pub fn stage(&self, id: StageId) -> &Stage {
        &self.stages[id]
    }

    pub fn stage_mut(&mut self, id: StageId) -> &mut Stage {
        &mut self.stages[id]
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Marks every stage as changed, forcing a full recompute next run.
    pub fn mark_all_changed(&mut self) {
        for stage in &mut self.stages {
            stage.has_changed = true;
        }
    }

    /// First stage of the chain: the one nothing links into.
    fn chain_head(&self) -> Option<StageId> {
        self.stages.iter().find(|s| s.src.is_none()).map(|s| s.id)
    }

    /// Chain order from head to tail, following sink links. Stops on a
    /// cycle; unreachable stages are not included.
    pub fn walk(&self) -> Vec<StageId> {
        let mut order = Vec::with_capacity(self.stages.len());
        let mut visited = vec![false; self.stages.len()];
        let mut current = self.chain_head();
        while let Some(id) = current {
            if visited[id] {
                break;
            }
            visited[id] = true;
            order.push(id);
            current = self.stages[id].sink;
        }
        order
    }

    /// Nearest upstream stage of the given class, if the chain has one.
    pub fn upstream_of(&self, id: StageId, class: crate::stage::StageClass) -> Option<StageId> {
        let mut current = self.stages[id].src;
        let mut hops = 0;
        while let Some(up) = current {
            if self.stages[up].class() == class {
                return Some(up);
            }
            current = self.stages[up].src;
            hops += 1;
            if hops > self.stages.len() {
                // Cyclic links; validation reports these separately.
                return None;
            }
        }
        None
    }

    /// Checks the graph: non-empty, exactly one reachable Source, exactly
    /// one reachable Sink, unique classes not duplicated, every link target
    /// linked back, no cycles, no disconnected stages.
    pub fn validate(&self) -> GraphState {
        if self.stages.is_empty() {
            return GraphState::Empty;
        }

        for stage in &self.stages {
            if stage.kind.is_unique()
                && self
                    .stages
                    .iter()
                    .filter(|s| s.class() == stage.class())
                    .count()
                    > 1
            {
                return GraphState::MultiElement;
            }
        }

        let sources: Vec<_> = self
            .stages
            .iter()
            .filter(|s| s.role() == ConnectionRole::Source)
            .collect();
        if sources.is_empty() {
            return GraphState::NoSource;
        }
        if sources.len() > 1 {
            return GraphState::MultiplePipelines;
        }

        let sinks = self
            .stages
            .iter()
            .filter(|s| s.role() == ConnectionRole::Sink)
            .count();
        if sinks == 0 {
            return GraphState::NoSink;
        }
        if sinks > 1 {
            return GraphState::MultiplePipelines;
        }

        // Walk forward from the source checking both link directions.
        let source = sources[0].id;
        if self.stages[source].src.is_some() {
            return GraphState::InvalidConnection;
        }
        let mut visited = vec![false; self.stages.len()];
        let mut current = source;
        visited[current] = true;
        loop {
            match self.stages[current].sink {
                Some(next) => {
                    if next >= self.stages.len() || visited[next] {
                        return GraphState::InvalidConnection;
                    }
                    if self.stages[next].src != Some(current) {
                        return GraphState::InvalidConnection;
                    }
                    visited[next] = true;
                    current = next;
                }
                None => break,
            }
        }
        if self.stages[current].role() != ConnectionRole::Sink {
            return GraphState::InvalidConnection;
        }
        if visited.iter().any(|v| !v) {
            return GraphState::MultiplePipelines;
        }

        GraphState::Valid
    }

    /// Draws a fresh run seed from the graph PRNG.
    pub fn generate_seed(&mut self) {
        self.seed = self.rng.random();
    }

    /// Seed a stage's processor should use this run.
    pub fn stage_seed(&self, id: StageId) -> u64 {
        self.stages[id].fixed_seed.unwrap_or(self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{
        GirthParams, LSystemParams, LengthParams, MeshParams, StageClass, StageKind,
    };

    fn full_graph() -> StageGraph {
        let mut graph = StageGraph::new(42);
        graph.add_stage(StageKind::Baker);
        graph.add_stage(StageKind::LSystem(LSystemParams::default()));
        graph.add_stage(StageKind::LengthTransform(LengthParams::default()));
        graph.add_stage(StageKind::GirthTransform(GirthParams::default()));
        graph.add_stage(StageKind::MeshGenerator(MeshParams::default()));
        graph
    }

    #[test]
    fn insertion_orders_the_chain_by_weight() {
        let graph = full_graph();
        let weights: Vec<i32> = graph
            .walk()
            .into_iter()
            .map(|id| graph.stage(id).position_weight())
            .collect();
        let mut sorted = weights.clone();
        sorted.sort();
        assert_eq!(weights, sorted, "chain must be non-decreasing in weight");
        assert_eq!(weights.len(), 5);
    }

    #[test]
    fn chain_links_are_mutual() {
        let graph = full_graph();
        for id in graph.walk() {
            if let Some(next) = graph.stage(id).sink() {
                assert_eq!(graph.stage(next).src(), Some(id));
            }
        }
    }

    #[test]
    fn empty_graph_reports_empty() {
        let graph = StageGraph::new(1);
        assert_eq!(graph.validate(), GraphState::Empty);
    }

    #[test]
    fn graph_without_source_reports_no_source() {
        let mut graph = StageGraph::new(1);
        graph.add_stage(StageKind::GirthTransform(GirthParams::default()));
        graph.add_stage(StageKind::Baker);
        assert_eq!(graph.validate(), GraphState::NoSource);
    }

    #[test]
    fn graph_without_sink_reports_no_sink() {
        let mut graph = StageGraph::new(1);
        graph.add_stage(StageKind::LSystem(LSystemParams::default()));
        graph.add_stage(StageKind::GirthTransform(GirthParams::default()));
        assert_eq!(graph.validate(), GraphState::NoSink);
    }

    #[test]
    fn duplicated_unique_class_reports_multi_element() {
        let mut graph = StageGraph::new(1);
        graph.add_stage(StageKind::LSystem(LSystemParams::default()));
        graph.add_stage(StageKind::GirthTransform(GirthParams::default()));
        graph.add_stage(StageKind::GirthTransform(GirthParams::default()));
        graph.add_stage(StageKind::Baker);
        assert_eq!(graph.validate(), GraphState::MultiElement);
    }

    #[test]
    fn broken_back_link_reports_invalid_connection() {
        let mut graph = full_graph();
        // Sever a back link to fake a dangling connection.
        let order = graph.walk();
        let mid = order[2];
        graph.stage_mut(mid).src = None;
        assert_eq!(graph.validate(), GraphState::InvalidConnection);
    }

    #[test]
    fn valid_graph_reports_valid() {
        assert_eq!(full_graph().validate(), GraphState::Valid);
    }

    #[test]
    fn upstream_lookup_walks_source_links() {
        let graph = full_graph();
        let order = graph.walk();
        // The mesh generator sits right before the baker; its upstream chain
        // contains the L-System but not the baker.
        let mesh = order[order.len() - 2];
        assert!(graph.upstream_of(mesh, StageClass::LSystem).is_some());
        assert!(graph.upstream_of(mesh, StageClass::Baker).is_none());
    }

    #[test]
    fn generate_seed_is_reproducible_from_equal_rng_state() {
        let mut a = StageGraph::new(9);
        let mut b = StageGraph::new(9);
        a.generate_seed();
        b.generate_seed();
        assert_eq!(a.seed, b.seed);
    }

    #[test]
    fn fixed_seed_overrides_the_run_seed() {
        let mut graph = full_graph();
        let order = graph.walk();
        let source = order[0];
        graph.stage_mut(source).fixed_seed = Some(77);
        graph.generate_seed();
        assert_eq!(graph.stage_seed(source), 77);
        assert_eq!(graph.stage_seed(order[1]), graph.seed);
    }
}
