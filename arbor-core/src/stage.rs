//! Pipeline stages: typed, orderable nodes of the generation graph.
//!
//! Each stage kind is a variant of the closed [`StageKind`] enum carrying
//! its own parameter struct; the runner dispatches on the variant, so adding
//! a kind is exhaustiveness-checked at compile time. Stages link into a
//! singly linked chain via source/sink ids, ordered by a fixed position
//! weight: lower weights run first.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::geom::Curve;
use crate::lsystem::Rule;
use crate::types::StageId;

/// How a stage connects into the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionRole {
    Source,
    Transform,
    Sink,
}

/// Base weights per processing band. A stage's position weight decides its
/// order in the chain and which lifecycle events fire around it.
pub mod weight {
    pub const STRUCTURE_GENERATOR: i32 = 0;
    pub const STRUCTURE_TRANSFORM: i32 = 100;
    pub const MESH_GENERATOR: i32 = 200;
    pub const MAPPER: i32 = 300;
    pub const EFFECT: i32 = 400;
}

/// Class identity of a stage, used for uniqueness checks and upstream
/// lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageClass {
    LSystem,
    GirthTransform,
    LengthTransform,
    BranchBender,
    SproutGenerator,
    MeshGenerator,
    BranchMapper,
    Baker,
}

/// Parameters for the L-System structure source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LSystemParams {
    pub axiom: String,
    pub rules: Vec<Rule>,
    pub iterations: usize,
    pub accumulative: bool,
    pub remove_overlaps: bool,
    pub length: f32,
    pub length_growth: f32,
    pub turn_angle: f32,
    pub turn_angle_growth: f32,
    pub pitch_angle: f32,
    pub pitch_angle_growth: f32,
    pub roll_angle: f32,
    pub roll_angle_growth: f32,
}

impl Default for LSystemParams {
    fn default() -> Self {
        Self {
            axiom: "F".to_string(),
            rules: Vec::new(),
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
        }
    }
}

/// Parameters for the girth transform.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GirthParams {
    pub min_girth_at_top: f32,
    pub max_girth_at_top: f32,
    pub min_girth_at_base: f32,
    pub max_girth_at_base: f32,
    pub curve: Curve,
    /// Scale down branches that leave the main axis.
    pub hierarchy_scaling_enabled: bool,
    pub min_hierarchy_scale: f32,
}

impl Default for GirthParams {
    fn default() -> Self {
        Self {
            min_girth_at_top: 0.02,
            max_girth_at_top: 0.05,
            min_girth_at_base: 0.2,
            max_girth_at_base: 0.35,
            curve: Curve::default(),
            hierarchy_scaling_enabled: false,
            min_hierarchy_scale: 0.5,
        }
    }
}

/// Parameters for the length transform.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LengthParams {
    pub min_factor: f32,
    pub max_factor: f32,
    /// Shapes the factor over the branch's hierarchy level.
    pub level_curve: Curve,
    /// Shapes the factor over the branch's position along its parent.
    pub position_curve: Curve,
}

impl Default for LengthParams {
    fn default() -> Self {
        Self {
            min_factor: 0.8,
            max_factor: 1.2,
            level_curve: Curve::constant(1.0),
            position_curve: Curve::constant(1.0),
        }
    }
}

/// Parameters for the branch bender.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BenderParams {
    /// Lateral offset magnitude at full strength.
    pub strength: f32,
    /// Bend points recorded per branch.
    pub points_per_branch: usize,
}

impl Default for BenderParams {
    fn default() -> Self {
        Self {
            strength: 0.1,
            points_per_branch: 2,
        }
    }
}

/// Parameters for the sprout generator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SproutParams {
    pub per_branch: usize,
    /// Placement range along each branch.
    pub min_position: f32,
    pub max_position: f32,
    pub mesh_height: f32,
}

impl Default for SproutParams {
    fn default() -> Self {
        Self {
            per_branch: 3,
            min_position: 0.3,
            max_position: 1.0,
            mesh_height: 0.4,
        }
    }
}

/// Parameters for the branch mesh generator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MeshParams {
    /// Radial segments per branch ring, for the vertex/triangle estimate.
    pub radial_segments: usize,
}

impl Default for MeshParams {
    fn default() -> Self {
        Self { radial_segments: 8 }
    }
}

/// Parameters for the branch mapper.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapperParams {
    pub material_id: u32,
    pub uv_tiling: Vec2,
}

impl Default for MapperParams {
    fn default() -> Self {
        Self {
            material_id: 0,
            uv_tiling: Vec2::ONE,
        }
    }
}

/// The closed set of stage kinds with their parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum StageKind {
    LSystem(LSystemParams),
    GirthTransform(GirthParams),
    LengthTransform(LengthParams),
    BranchBender(BenderParams),
    SproutGenerator(SproutParams),
    MeshGenerator(MeshParams),
    BranchMapper(MapperParams),
    Baker,
}

impl StageKind {
    pub fn class(&self) -> StageClass {
        match self {
            StageKind::LSystem(_) => StageClass::LSystem,
            StageKind::GirthTransform(_) => StageClass::GirthTransform,
            StageKind::LengthTransform(_) => StageClass::LengthTransform,
            StageKind::BranchBender(_) => StageClass::BranchBender,
            StageKind::SproutGenerator(_) => StageClass::SproutGenerator,
            StageKind::MeshGenerator(_) => StageClass::MeshGenerator,
            StageKind::BranchMapper(_) => StageClass::BranchMapper,
            StageKind::Baker => StageClass::Baker,
        }
    }

    pub fn role(&self) -> ConnectionRole {
        match self {
            StageKind::LSystem(_) => ConnectionRole::Source,
            StageKind::Baker => ConnectionRole::Sink,
            _ => ConnectionRole::Transform,
        }
    }

    /// Total order key for the chain; lower runs first.
    pub fn position_weight(&self) -> i32 {
        match self {
            StageKind::LSystem(_) => weight::STRUCTURE_GENERATOR,
            StageKind::GirthTransform(_) => weight::STRUCTURE_TRANSFORM,
            StageKind::LengthTransform(_) => weight::STRUCTURE_TRANSFORM + 10,
            StageKind::BranchBender(_) => weight::STRUCTURE_TRANSFORM + 20,
            StageKind::SproutGenerator(_) => weight::STRUCTURE_TRANSFORM + 30,
            StageKind::MeshGenerator(_) => weight::MESH_GENERATOR,
            StageKind::BranchMapper(_) => weight::MAPPER,
            StageKind::Baker => weight::EFFECT,
        }
    }

    pub fn uses_randomization(&self) -> bool {
        matches!(
            self,
            StageKind::LSystem(_)
                | StageKind::GirthTransform(_)
                | StageKind::BranchBender(_)
                | StageKind::SproutGenerator(_)
        )
    }

    /// `true` when at most one instance of the class may be on a pipeline.
    pub fn is_unique(&self) -> bool {
        // Every current kind is unique; per-instance kinds would opt out here.
        true
    }
}

/// A stage instance on a pipeline.
#[derive(Clone, Debug)]
pub struct Stage {
    pub id: StageId,
    pub kind: StageKind,
    pub is_active: bool,
    /// New data since the last run; cleared contributions otherwise.
    pub has_changed: bool,
    /// Fixed seed for this stage's randomization; `None` follows the
    /// graph-wide run seed.
    pub fixed_seed: Option<u64>,
    /// Upstream link.
    pub(crate) src: Option<StageId>,
    /// Downstream link.
    pub(crate) sink: Option<StageId>,
}

impl Stage {
    pub(crate) fn new(id: StageId, kind: StageKind) -> Self {
        Self {
            id,
            kind,
            is_active: true,
            has_changed: true,
            fixed_seed: None,
            src: None,
            sink: None,
        }
    }

    pub fn role(&self) -> ConnectionRole {
        self.kind.role()
    }

    pub fn class(&self) -> StageClass {
        self.kind.class()
    }

    pub fn position_weight(&self) -> i32 {
        self.kind.position_weight()
    }

    pub fn uses_randomization(&self) -> bool {
        self.kind.uses_randomization()
    }

    /// Upstream stage id, when linked.
    pub fn src(&self) -> Option<StageId> {
        self.src
    }

    /// Downstream stage id, when linked.
    pub fn sink(&self) -> Option<StageId> {
        self.sink
    }
}
