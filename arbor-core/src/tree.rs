//! The shared branch tree data model.
//!
//! Every pipeline stage reads and/or mutates one [`BranchTree`]. The tree is
//! a flat arena: branches live in a single `Vec` indexed by [`BranchId`],
//! children are index lists and parents are back-indices, so there are no
//! ownership cycles and id-based lookups are direct.
//!
//! The tree holds no processing logic. Girth and length values are only
//! authoritative after the corresponding stage has run for the current
//! process; absolute origins are only authoritative after [`BranchTree::resolve`].

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::geom::Curve;
use crate::types::BranchId;

/// A leaf/twig attachment point on a branch.
///
/// Sprouts carry no mesh data here; `mesh_height` is the modeled height of
/// the sprout card, used when sampling outline points for hull building.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sprout {
    /// Position along the owning branch, `0..=1`.
    pub position: f32,
    /// Direction the sprout grows in.
    pub direction: Vec3,
    /// Height of the sprout geometry; `0` means "not meshed yet".
    pub mesh_height: f32,
}

/// A bend offset recorded by the bender stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BendPoint {
    /// Position along the owning branch, `0..=1`.
    pub position: f32,
    /// Lateral offset applied at that position.
    pub offset: Vec3,
}

/// One branch in the tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Branch {
    pub id: BranchId,
    pub parent: Option<BranchId>,
    pub children: Vec<BranchId>,
    /// Unit growth direction.
    pub direction: Vec3,
    /// Position along the parent branch, `0..=1`. Zero for roots.
    pub position: f32,
    /// Base length, set by the structure generator.
    pub length: f32,
    /// Multiplier applied by the length stage; identity when untouched.
    pub length_factor: f32,
    /// Girth at the branch tip.
    pub min_girth: f32,
    /// Girth at the branch base.
    pub max_girth: f32,
    /// Hierarchy scale applied on top of the girth curve.
    pub girth_scale: f32,
    pub girth_curve: Curve,
    pub bend_points: Vec<BendPoint>,
    pub sprouts: Vec<Sprout>,
    /// Child continuing this branch's main axis, if any.
    pub follow_up: Option<BranchId>,
    pub is_root: bool,
    /// Value set externally; stages must not overwrite it.
    pub is_tuned: bool,
    /// Absolute position of the branch base. Authoritative after
    /// [`BranchTree::resolve`].
    pub origin: Vec3,
}

impl Branch {
    fn new(id: BranchId, direction: Vec3) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            direction,
            position: 0.0,
            length: 1.0,
            length_factor: 1.0,
            min_girth: 0.05,
            max_girth: 0.25,
            girth_scale: 1.0,
            girth_curve: Curve::default(),
            bend_points: Vec::new(),
            sprouts: Vec::new(),
            follow_up: None,
            is_root: false,
            is_tuned: false,
            origin: Vec3::ZERO,
        }
    }

    /// Length with the length stage's factor applied.
    pub fn effective_length(&self) -> f32 {
        self.length * self.length_factor
    }

    /// Restores girth values to their construction defaults.
    pub fn reset_girth(&mut self) {
        self.min_girth = 0.05;
        self.max_girth = 0.25;
        self.girth_scale = 1.0;
        self.girth_curve = Curve::default();
    }

    /// Restores the length factor to identity.
    pub fn reset_length(&mut self) {
        self.length_factor = 1.0;
    }

    /// Girth at relative position `t` along the branch: widest at the base,
    /// narrowing to `min_girth` at the tip, shaped by the girth curve.
    pub fn girth_at(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        let shaped = self.girth_curve.eval(1.0 - t);
        (self.min_girth + (self.max_girth - self.min_girth) * shaped) * self.girth_scale
    }

    /// Point at relative position `t` along the branch axis.
    ///
    /// Valid only after the tree has been resolved.
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * (self.effective_length() * t.clamp(0.0, 1.0))
    }
}

/// The whole branch structure of one tree.
#[derive(Clone, Debug, Default)]
pub struct BranchTree {
    pub branches: Vec<Branch>,
    roots: Vec<BranchId>,
    /// Absolute position of the tree base.
    pub position: Vec3,
}

impl BranchTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every branch, keeping the container for the next run.
    pub fn clear(&mut self) {
        self.branches.clear();
        self.roots.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn roots(&self) -> &[BranchId] {
        &self.roots
    }

    /// Adds a root branch and returns its id.
    pub fn add_root(&mut self, direction: Vec3, length: f32) -> BranchId {
        let id = self.branches.len();
        let mut branch = Branch::new(id, direction);
        branch.is_root = true;
        branch.length = length;
        self.branches.push(branch);
        self.roots.push(id);
        id
    }

    /// Adds a child branch attached to `parent` at relative `position` and
    /// returns its id.
    pub fn add_child(
        &mut self,
        parent: BranchId,
        direction: Vec3,
        position: f32,
        length: f32,
    ) -> BranchId {
        let id = self.branches.len();
        let mut branch = Branch::new(id, direction);
        branch.parent = Some(parent);
        branch.position = position;
        branch.length = length;
        self.branches.push(branch);
        self.branches[parent].children.push(id);
        id
    }

    /// Hierarchy level of a branch: roots are level 0.
    pub fn level_of(&self, id: BranchId) -> usize {
        let mut level = 0;
        let mut current = id;
        while let Some(parent) = self.branches[current].parent {
            level += 1;
            current = parent;
        }
        level
    }

    /// Deepest hierarchy level present, plus one; an empty tree has 0.
    pub fn offspring_level(&self) -> usize {
        self.branches
            .iter()
            .map(|b| self.level_of(b.id) + 1)
            .max()
            .unwrap_or(0)
    }

    /// All branch ids in pre-order (each root, then its subtree).
    pub fn descendants(&self) -> Vec<BranchId> {
        let mut out = Vec::with_capacity(self.branches.len());
        for &root in &self.roots {
            self.collect_subtree(root, &mut out);
        }
        out
    }

    /// Branch ids at exactly the given hierarchy level.
    pub fn descendants_at_level(&self, level: usize) -> Vec<BranchId> {
        self.descendants()
            .into_iter()
            .filter(|&id| self.level_of(id) == level)
            .collect()
    }

    /// Pre-order ids of the subtree rooted at `id`, including `id`.
    pub fn subtree_ids(&self, id: BranchId) -> Vec<BranchId> {
        let mut out = Vec::new();
        self.collect_subtree(id, &mut out);
        out
    }

    fn collect_subtree(&self, id: BranchId, out: &mut Vec<BranchId>) {
        out.push(id);
        // Children are indexed, not borrowed, so clone the small id list.
        let children = self.branches[id].children.clone();
        for child in children {
            self.collect_subtree(child, out);
        }
    }

    /// Recomputes absolute origins from directions, lengths and relative
    /// positions. Must run whenever structure or lengths change before any
    /// caller asks for points.
    pub fn resolve(&mut self) {
        let order = self.descendants();
        for id in order {
            let origin = match self.branches[id].parent {
                None => self.position,
                Some(parent) => {
                    let p = &self.branches[parent];
                    p.point_at(self.branches[id].position)
                }
            };
            self.branches[id].origin = origin;
        }
    }

    /// Marks, for every branch, the child that continues the main axis: the
    /// one carrying the most descendants.
    pub fn set_follow_ups_by_weight(&mut self) {
        for id in 0..self.branches.len() {
            let follow_up = self.branches[id]
                .children
                .iter()
                .copied()
                .max_by_key(|&c| self.subtree_ids(c).len());
            self.branches[id].follow_up = follow_up;
        }
    }
}
