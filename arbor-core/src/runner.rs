//! Stage dispatch: maps each stage to its processor and drives a full
//! pipeline run over the branch tree.
//!
//! The runner owns the processor-local caches (the L-System's last ray
//! forest, the mesh and mapping descriptors) so the graph and tree stay pure
//! data. A run is synchronous and single-threaded; the graph PRNG is
//! snapshotted before the walk and restored afterwards, so a run's
//! randomness never perturbs later, unrelated calls.

use glam::{Quat, Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::control::{ChangedAspects, ProcessControl, ProcessType};
use crate::geom::{Aabb, inverse_lerp, lerp};
use crate::graph::{GraphState, StageGraph};
use crate::log::LogItem;
use crate::lsystem::{LSystem, Ray};
use crate::stage::{
    BenderParams, GirthParams, LSystemParams, LengthParams, MeshParams, SproutParams, StageClass,
    StageKind, weight,
};
use crate::tree::{BendPoint, BranchTree, Sprout};
use crate::types::{BranchId, StageId};

/// Bounds and size estimate of the rendered branch mesh; the stand-in for
/// what the external mesh manager reports back.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshDescriptor {
    pub bounds: Aabb,
    pub vertex_count: usize,
    pub triangle_count: usize,
}

/// Material/UV assignment produced by the branch mapper.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MappingDescriptor {
    pub material_id: u32,
    pub uv_tiling: Vec2,
}

/// Options for one processing run.
#[derive(Clone, Debug)]
pub struct ProcessRequest {
    pub process_type: ProcessType,
    pub lod_index: usize,
    /// Stage that triggered the run; only it may reuse its local cache.
    pub trigger: Option<StageId>,
    /// Allow stages upstream of the trigger to reuse prior results.
    pub use_cache: bool,
    /// Discard all processor caches and rebuild from scratch.
    pub force_rebuild: bool,
    /// Aspects no processor may recompute this run.
    pub locked: ChangedAspects,
}

impl Default for ProcessRequest {
    fn default() -> Self {
        Self {
            process_type: ProcessType::Preview,
            lod_index: 0,
            trigger: None,
            use_cache: false,
            force_rebuild: false,
            locked: ChangedAspects::empty(),
        }
    }
}

/// Local cache of the structure generator: the last ray forest and the
/// parameters it was generated from.
#[derive(Debug)]
struct StructureCache {
    stage: StageId,
    params: LSystemParams,
    seed: u64,
    rays: Vec<Ray>,
}

/// Drives stage processors over a graph/tree pair.
#[derive(Debug, Default)]
pub struct StageRunner {
    structure_cache: Option<StructureCache>,
    mesh: Option<MeshDescriptor>,
    mapping: Option<MappingDescriptor>,
    last_control: Option<ProcessControl>,
}

/// Lifecycle phases fired once per run, in order, as the walk crosses their
/// weight thresholds.
const PHASES: [(&str, i32); 3] = [
    ("structure complete", weight::MESH_GENERATOR),
    ("mesh complete", weight::MAPPER),
    ("mapping complete", weight::EFFECT),
];

impl StageRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mesh descriptor from the last run, if a mesh stage produced one.
    pub fn mesh(&self) -> Option<&MeshDescriptor> {
        self.mesh.as_ref()
    }

    /// Mapping descriptor from the last run, if a mapper produced one.
    pub fn mapping(&self) -> Option<&MappingDescriptor> {
        self.mapping.as_ref()
    }

    /// Process control record of the last completed run.
    pub fn last_control(&self) -> Option<&ProcessControl> {
        self.last_control.as_ref()
    }

    fn clear_caches(&mut self) {
        self.structure_cache = None;
        self.mesh = None;
        self.mapping = None;
    }

    /// Runs the pipeline over `tree`.
    ///
    /// Returns `false` without mutating the tree when validation fails;
    /// otherwise walks the chain from source to sink in position-weight
    /// order, processing active+changed stages and unprocessing the rest,
    /// and fires the three lifecycle phases exactly once each.
    pub fn process(
        &mut self,
        graph: &mut StageGraph,
        tree: &mut BranchTree,
        request: &ProcessRequest,
    ) -> bool {
        let state = graph.validate();
        if state != GraphState::Valid {
            graph.log.push(LogItem::warn(format!("refusing to process: {state}")));
            return false;
        }

        let force_rebuild =
            request.force_rebuild || (request.trigger.is_none() && !request.use_cache);
        if tree.is_empty() || force_rebuild {
            self.clear_caches();
        }
        tree.clear();

        // Scope the run's randomness: snapshot the graph PRNG by value and
        // restore it after the walk.
        let rng_snapshot = graph.rng.clone();
        if !request.use_cache {
            graph.generate_seed();
        }

        let mut control =
            ProcessControl::new(request.trigger, request.process_type, request.lod_index);
        control.lock(request.locked);

        let mut fired = [false; PHASES.len()];
        for id in graph.walk() {
            let reached_weight = graph.stage(id).position_weight();
            self.fire_phases(&mut fired, reached_weight, tree, graph);
            let (is_active, has_changed) = {
                let stage = graph.stage(id);
                (stage.is_active, stage.has_changed)
            };
            if is_active && has_changed {
                let use_local = request.trigger == Some(id);
                let aspects =
                    self.process_stage(graph, id, tree, request.use_cache, use_local, &control);
                control.add_changed(aspects);
            } else {
                self.unprocess_stage(graph, id, tree);
            }
        }
        self.fire_phases(&mut fired, i32::MAX, tree, graph);

        graph.rng = rng_snapshot;
        self.last_control = Some(control);
        true
    }

    /// Fires any phase whose threshold the walk has now crossed.
    fn fire_phases(
        &mut self,
        fired: &mut [bool; PHASES.len()],
        reached_weight: i32,
        tree: &mut BranchTree,
        graph: &mut StageGraph,
    ) {
        for (i, (name, threshold)) in PHASES.iter().enumerate() {
            if !fired[i] && reached_weight >= *threshold {
                fired[i] = true;
                if i == 0 {
                    // Structure is final: resolve absolute origins before any
                    // mesh-band stage samples points.
                    tree.resolve();
                }
                graph.log.push(LogItem::info(*name));
            }
        }
    }

    fn process_stage(
        &mut self,
        graph: &mut StageGraph,
        id: StageId,
        tree: &mut BranchTree,
        use_cache: bool,
        use_local_cache: bool,
        control: &ProcessControl,
    ) -> ChangedAspects {
        let kind = graph.stage(id).kind.clone();
        let seed = graph.stage_seed(id);
        match kind {
            StageKind::LSystem(params) => {
                self.process_structure(id, &params, seed, use_cache || use_local_cache, tree, control)
            }
            StageKind::GirthTransform(params) => process_girth(&params, seed, tree, control),
            StageKind::LengthTransform(params) => process_length(&params, tree, control),
            StageKind::BranchBender(params) => process_bender(&params, seed, tree, control),
            StageKind::SproutGenerator(params) => process_sprouts(&params, seed, tree, control),
            StageKind::MeshGenerator(params) => {
                let descriptor = build_mesh_descriptor(&params, tree);
                self.mesh = Some(descriptor);
                ChangedAspects::MESH
            }
            StageKind::BranchMapper(params) => {
                if graph.upstream_of(id, StageClass::MeshGenerator).is_none() || self.mesh.is_none()
                {
                    // Optional upstream missing; a normal configuration. Drop
                    // any prior mapping so stale data never lingers.
                    self.mapping = None;
                    graph.log.push(
                        LogItem::info("branch mapper skipped: no mesh generator upstream")
                            .for_stage(id),
                    );
                    return ChangedAspects::empty();
                }
                self.mapping = Some(MappingDescriptor {
                    material_id: params.material_id,
                    uv_tiling: params.uv_tiling,
                });
                ChangedAspects::MATERIAL
            }
            StageKind::Baker => ChangedAspects::empty(),
        }
    }

    /// Removes a stage's prior contribution so stale data never lingers.
    fn unprocess_stage(&mut self, graph: &StageGraph, id: StageId, tree: &mut BranchTree) {
        match graph.stage(id).class() {
            StageClass::LSystem => {
                // The tree container was cleared at run start; dropping the
                // cache removes the remaining contribution.
                self.structure_cache = None;
            }
            StageClass::GirthTransform => {
                for branch in &mut tree.branches {
                    if !branch.is_tuned {
                        branch.reset_girth();
                    }
                }
            }
            StageClass::LengthTransform => {
                for branch in &mut tree.branches {
                    if !branch.is_tuned {
                        branch.reset_length();
                    }
                }
            }
            StageClass::BranchBender => {
                for branch in &mut tree.branches {
                    if !branch.is_tuned {
                        branch.bend_points.clear();
                    }
                }
            }
            StageClass::SproutGenerator => {
                for branch in &mut tree.branches {
                    branch.sprouts.clear();
                }
            }
            StageClass::MeshGenerator => self.mesh = None,
            StageClass::BranchMapper => self.mapping = None,
            StageClass::Baker => {}
        }
    }

    fn process_structure(
        &mut self,
        id: StageId,
        params: &LSystemParams,
        seed: u64,
        allow_cache: bool,
        tree: &mut BranchTree,
        control: &ProcessControl,
    ) -> ChangedAspects {
        if control.is_locked(ChangedAspects::STRUCTURE) {
            return ChangedAspects::empty();
        }

        let cached = allow_cache
            && !control.has_changed(ChangedAspects::STRUCTURE)
            && self
                .structure_cache
                .as_ref()
                .is_some_and(|c| c.stage == id && c.seed == seed && &c.params == params);

        let rays = if cached {
            self.structure_cache
                .as_ref()
                .map(|c| c.rays.clone())
                .unwrap_or_default()
        } else {
            let system = build_lsystem(params);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let rays = system.generate(&mut rng);
            self.structure_cache = Some(StructureCache {
                stage: id,
                params: params.clone(),
                seed,
                rays: rays.clone(),
            });
            rays
        };

        for ray in &rays {
            let root = tree.add_root(ray.direction, ray.length);
            populate_branch(tree, root, &ray.children);
        }
        ChangedAspects::STRUCTURE
    }
}

fn build_lsystem(params: &LSystemParams) -> LSystem {
    let mut system = LSystem {
        axiom: params.axiom.clone(),
        iterations: params.iterations,
        accumulative: params.accumulative,
        remove_overlaps: params.remove_overlaps,
        length: params.length,
        length_growth: params.length_growth,
        turn_angle: params.turn_angle,
        turn_angle_growth: params.turn_angle_growth,
        pitch_angle: params.pitch_angle,
        pitch_angle_growth: params.pitch_angle_growth,
        roll_angle: params.roll_angle,
        roll_angle_growth: params.roll_angle_growth,
        ..LSystem::default()
    };
    for rule in &params.rules {
        system.add_rule(rule.clone());
    }
    system
}

/// Turns a ray's children into branches, assigning ids in pre-order; every
/// child attaches at its parent's tip.
fn populate_branch(tree: &mut BranchTree, parent: BranchId, rays: &[Ray]) {
    for ray in rays {
        let child = tree.add_child(parent, ray.direction, 1.0, ray.length);
        populate_branch(tree, child, &ray.children);
    }
}

fn process_girth(
    params: &GirthParams,
    seed: u64,
    tree: &mut BranchTree,
    control: &ProcessControl,
) -> ChangedAspects {
    if control.is_locked(ChangedAspects::GIRTH) {
        return ChangedAspects::empty();
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let girth_at_top = rng.random_range(params.min_girth_at_top..=params.max_girth_at_top);
    let girth_at_base = rng.random_range(params.min_girth_at_base..=params.max_girth_at_base);

    if params.hierarchy_scaling_enabled {
        tree.set_follow_ups_by_weight();
    }
    for id in tree.descendants() {
        // A branch leaving the main axis with no continuation of its own
        // gets the hierarchy scale.
        let demoted = params.hierarchy_scaling_enabled && {
            let branch = &tree.branches[id];
            branch.follow_up.is_none()
                && branch
                    .parent
                    .is_some_and(|p| tree.branches[p].follow_up != Some(id))
        };
        let branch = &mut tree.branches[id];
        branch.min_girth = girth_at_top;
        branch.max_girth = girth_at_base;
        branch.girth_curve = params.curve.clone();
        branch.girth_scale = if demoted { params.min_hierarchy_scale } else { 1.0 };
    }
    ChangedAspects::GIRTH
}

fn process_length(
    params: &LengthParams,
    tree: &mut BranchTree,
    control: &ProcessControl,
) -> ChangedAspects {
    if control.is_locked(ChangedAspects::LENGTH) {
        return ChangedAspects::empty();
    }
    let levels = tree.offspring_level();
    for id in tree.descendants() {
        let level = tree.level_of(id);
        let branch = &mut tree.branches[id];
        if branch.is_tuned || branch.is_root {
            continue;
        }
        let relative_level = inverse_lerp(0.0, (levels.max(2) - 1) as f32, level as f32);
        let t = params.level_curve.eval(relative_level) * params.position_curve.eval(branch.position);
        branch.length_factor = lerp(params.min_factor, params.max_factor, t);
    }
    ChangedAspects::LENGTH
}

fn process_bender(
    params: &BenderParams,
    seed: u64,
    tree: &mut BranchTree,
    control: &ProcessControl,
) -> ChangedAspects {
    if control.is_locked(ChangedAspects::BEND_POINTS) {
        return ChangedAspects::empty();
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for id in tree.descendants() {
        if tree.branches[id].is_tuned {
            continue;
        }
        let direction = tree.branches[id].direction;
        let ortho = direction.any_orthonormal_vector();
        let mut points = Vec::with_capacity(params.points_per_branch);
        for i in 0..params.points_per_branch {
            let position = (i + 1) as f32 / (params.points_per_branch + 1) as f32;
            let angle = rng.random_range(0.0..std::f32::consts::TAU);
            let magnitude = params.strength * rng.random::<f32>();
            let offset = Quat::from_axis_angle(direction, angle) * ortho * magnitude;
            points.push(BendPoint { position, offset });
        }
        tree.branches[id].bend_points = points;
    }
    ChangedAspects::BEND_POINTS
}

fn process_sprouts(
    params: &SproutParams,
    seed: u64,
    tree: &mut BranchTree,
    control: &ProcessControl,
) -> ChangedAspects {
    if control.is_locked(ChangedAspects::STRUCTURE) {
        return ChangedAspects::empty();
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let min = params.min_position.min(params.max_position);
    let max = params.min_position.max(params.max_position);
    for id in tree.descendants() {
        let direction = tree.branches[id].direction;
        let ortho = direction.any_orthonormal_vector();
        let mut sprouts = Vec::with_capacity(params.per_branch);
        for _ in 0..params.per_branch {
            let position = rng.random_range(min..=max);
            let yaw = rng.random_range(0.0..std::f32::consts::TAU);
            let lateral = Quat::from_axis_angle(direction, yaw) * ortho;
            let sprout_direction = (lateral + direction * 0.5).normalize_or_zero();
            sprouts.push(Sprout {
                position,
                direction: sprout_direction,
                mesh_height: params.mesh_height,
            });
        }
        tree.branches[id].sprouts = sprouts;
    }
    ChangedAspects::STRUCTURE
}

/// Derives the mesh descriptor from the resolved skeleton: bounds over all
/// branch ends and sprout tips, inflated by the thickest girth, plus flat
/// vertex/triangle estimates for the tube mesh.
fn build_mesh_descriptor(params: &MeshParams, tree: &BranchTree) -> MeshDescriptor {
    let mut bounds = Aabb::EMPTY;
    let mut max_girth: f32 = 0.0;
    for branch in &tree.branches {
        bounds.grow(branch.point_at(0.0));
        bounds.grow(branch.point_at(1.0));
        max_girth = max_girth.max(branch.girth_at(0.0));
        for sprout in &branch.sprouts {
            let tip = branch.point_at(sprout.position)
                + sprout.direction.normalize_or_zero() * sprout.mesh_height;
            bounds.grow(tip);
        }
    }
    if bounds.is_empty() {
        bounds = Aabb::default();
    } else {
        bounds.inflate(max_girth * 0.5);
    }
    let rings = params.radial_segments.max(3);
    MeshDescriptor {
        bounds,
        vertex_count: tree.len() * (rings + 1) * 2,
        triangle_count: tree.len() * rings * 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::Severity;
    use crate::lsystem::Rule;
    use crate::stage::MapperParams;

    fn fork_params() -> LSystemParams {
        LSystemParams {
            axiom: "F".to_string(),
            rules: vec![Rule::new('F', "F[/F][\\F]")],
            iterations: 2,
            ..LSystemParams::default()
        }
    }

    fn full_graph() -> StageGraph {
        let mut graph = StageGraph::new(42);
        graph.add_stage(StageKind::LSystem(fork_params()));
        graph.add_stage(StageKind::GirthTransform(GirthParams::default()));
        graph.add_stage(StageKind::LengthTransform(LengthParams::default()));
        graph.add_stage(StageKind::SproutGenerator(SproutParams::default()));
        graph.add_stage(StageKind::MeshGenerator(MeshParams::default()));
        graph.add_stage(StageKind::BranchMapper(MapperParams::default()));
        graph.add_stage(StageKind::Baker);
        graph
    }

    #[test]
    fn process_populates_a_binary_fork_tree() {
        let mut graph = full_graph();
        let mut tree = BranchTree::new();
        let mut runner = StageRunner::new();
        assert!(runner.process(&mut graph, &mut tree, &ProcessRequest::default()));
        // Two fork iterations: 1 root + 2 children + 4 grandchildren.
        assert_eq!(tree.len(), 7);
        assert_eq!(tree.roots().len(), 1);
        let control = runner.last_control().expect("run completed");
        assert!(control.has_changed(ChangedAspects::STRUCTURE));
        assert!(control.has_changed(ChangedAspects::GIRTH));
        assert!(control.has_changed(ChangedAspects::MESH));
        assert!(control.has_changed(ChangedAspects::MATERIAL));
    }

    #[test]
    fn invalid_graph_refuses_and_leaves_tree_untouched() {
        let mut graph = StageGraph::new(1);
        graph.add_stage(StageKind::GirthTransform(GirthParams::default()));
        let mut tree = BranchTree::new();
        tree.add_root(Vec3::Y, 1.0);
        let mut runner = StageRunner::new();
        assert!(!runner.process(&mut graph, &mut tree, &ProcessRequest::default()));
        assert_eq!(tree.len(), 1, "failed validation must not mutate the tree");
        assert!(graph.log.iter().any(|i| i.severity == Severity::Warn));
    }

    #[test]
    fn runs_are_deterministic_from_equal_rng_state() {
        let mut graph = full_graph();
        let mut runner = StageRunner::new();
        let mut first = BranchTree::new();
        runner.process(&mut graph, &mut first, &ProcessRequest::default());
        // The PRNG was restored, so the next run draws the same seed.
        let mut second = BranchTree::new();
        runner.process(&mut graph, &mut second, &ProcessRequest::default());
        assert_eq!(first.branches, second.branches);
    }

    #[test]
    fn process_restores_the_graph_rng() {
        let mut graph = full_graph();
        let rng_before = graph.rng.clone();
        let mut tree = BranchTree::new();
        StageRunner::new().process(&mut graph, &mut tree, &ProcessRequest::default());
        assert_eq!(graph.rng, rng_before);
    }

    #[test]
    fn cached_rerun_is_idempotent() {
        let mut graph = full_graph();
        let mut tree = BranchTree::new();
        let mut runner = StageRunner::new();
        runner.process(&mut graph, &mut tree, &ProcessRequest::default());
        let snapshot = tree.branches.clone();
        let trigger = graph.walk()[0];
        let request = ProcessRequest {
            use_cache: true,
            trigger: Some(trigger),
            ..ProcessRequest::default()
        };
        runner.process(&mut graph, &mut tree, &request);
        assert_eq!(tree.branches, snapshot, "cached rerun must not drift");
    }

    #[test]
    fn lifecycle_phases_fire_once_each_in_order() {
        let mut graph = full_graph();
        let mut tree = BranchTree::new();
        StageRunner::new().process(&mut graph, &mut tree, &ProcessRequest::default());
        let phases: Vec<String> = graph
            .log
            .iter()
            .filter(|i| i.severity == Severity::Info)
            .map(|i| i.message.clone())
            .filter(|m| m.ends_with("complete"))
            .collect();
        assert_eq!(
            phases,
            vec!["structure complete", "mesh complete", "mapping complete"]
        );
    }

    #[test]
    fn lifecycle_phases_fire_even_on_a_minimal_pipeline() {
        let mut graph = StageGraph::new(3);
        graph.add_stage(StageKind::LSystem(fork_params()));
        graph.add_stage(StageKind::Baker);
        let mut tree = BranchTree::new();
        StageRunner::new().process(&mut graph, &mut tree, &ProcessRequest::default());
        let count = graph
            .log
            .iter()
            .filter(|i| i.message.ends_with("complete"))
            .count();
        assert_eq!(count, 3);
    }

    #[test]
    fn mapper_without_mesh_generator_noops() {
        let mut graph = StageGraph::new(5);
        graph.add_stage(StageKind::LSystem(fork_params()));
        graph.add_stage(StageKind::BranchMapper(MapperParams::default()));
        graph.add_stage(StageKind::Baker);
        let mut tree = BranchTree::new();
        let mut runner = StageRunner::new();
        assert!(runner.process(&mut graph, &mut tree, &ProcessRequest::default()));
        assert!(runner.mapping().is_none());
        let control = runner.last_control().expect("run completed");
        assert!(!control.has_changed(ChangedAspects::MATERIAL));
    }

    #[test]
    fn inactive_stage_is_unprocessed() {
        let mut graph = full_graph();
        let mut tree = BranchTree::new();
        let mut runner = StageRunner::new();
        runner.process(&mut graph, &mut tree, &ProcessRequest::default());
        assert!(runner.mesh().is_some());

        // Deactivate the mesh generator; its descriptor must be removed and
        // the mapper degrades to a no-op.
        let mesh_id = graph
            .walk()
            .into_iter()
            .find(|&id| graph.stage(id).class() == StageClass::MeshGenerator)
            .expect("mesh stage present");
        graph.stage_mut(mesh_id).is_active = false;
        runner.process(&mut graph, &mut tree, &ProcessRequest::default());
        assert!(runner.mesh().is_none());
        assert!(runner.mapping().is_none());
    }

    #[test]
    fn locked_aspect_is_not_recomputed() {
        let mut graph = full_graph();
        let mut tree = BranchTree::new();
        let mut runner = StageRunner::new();
        let request = ProcessRequest {
            locked: ChangedAspects::GIRTH,
            ..ProcessRequest::default()
        };
        runner.process(&mut graph, &mut tree, &request);
        let control = runner.last_control().expect("run completed");
        assert!(!control.has_changed(ChangedAspects::GIRTH));
        // Girth stays at construction defaults.
        assert_eq!(tree.branches[0].max_girth, 0.25);
    }

    #[test]
    fn girth_stage_sets_tree_wide_girth() {
        let mut graph = full_graph();
        let mut tree = BranchTree::new();
        StageRunner::new().process(&mut graph, &mut tree, &ProcessRequest::default());
        let params = GirthParams::default();
        for branch in &tree.branches {
            assert!(branch.max_girth >= params.min_girth_at_base);
            assert!(branch.max_girth <= params.max_girth_at_base);
            assert!(branch.min_girth >= params.min_girth_at_top);
            assert!(branch.min_girth <= params.max_girth_at_top);
        }
    }

    #[test]
    fn length_stage_keeps_factor_within_configured_range() {
        let mut graph = full_graph();
        let mut tree = BranchTree::new();
        StageRunner::new().process(&mut graph, &mut tree, &ProcessRequest::default());
        let params = LengthParams::default();
        for branch in &tree.branches {
            if branch.is_root {
                assert_eq!(branch.length_factor, 1.0);
            } else {
                assert!(branch.length_factor >= params.min_factor);
                assert!(branch.length_factor <= params.max_factor);
            }
        }
    }

    #[test]
    fn sprout_stage_places_sprouts_in_range() {
        let mut graph = full_graph();
        let mut tree = BranchTree::new();
        StageRunner::new().process(&mut graph, &mut tree, &ProcessRequest::default());
        let params = SproutParams::default();
        for branch in &tree.branches {
            assert_eq!(branch.sprouts.len(), params.per_branch);
            for sprout in &branch.sprouts {
                assert!(sprout.position >= params.min_position);
                assert!(sprout.position <= params.max_position);
                assert_eq!(sprout.mesh_height, params.mesh_height);
            }
        }
    }

    #[test]
    fn mesh_descriptor_covers_the_resolved_tree() {
        let mut graph = full_graph();
        let mut tree = BranchTree::new();
        let mut runner = StageRunner::new();
        runner.process(&mut graph, &mut tree, &ProcessRequest::default());
        let mesh = runner.mesh().expect("mesh stage ran");
        assert!(mesh.vertex_count > 0);
        for branch in &tree.branches {
            let tip = branch.point_at(1.0);
            assert!(tip.x >= mesh.bounds.min.x && tip.x <= mesh.bounds.max.x);
            assert!(tip.y >= mesh.bounds.min.y && tip.y <= mesh.bounds.max.y);
            assert!(tip.z >= mesh.bounds.min.z && tip.z <= mesh.bounds.max.z);
        }
    }
}
