//! Fragments: named subsets of the branch tree used as the unit of hull and
//! texture generation.
//!
//! The [`FragmentBuilder`] is an explicit context bound to one finished
//! tree/mesh pair for the duration of a snapshot; it holds no global state
//! and can be dropped and rebuilt freely.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::geom::inverse_lerp;
use crate::runner::MeshDescriptor;
use crate::tree::BranchTree;
use crate::types::BranchId;

/// A subset of the branch tree.
///
/// `includes` and `excludes` are disjoint; a fragment with neither denotes
/// the whole subtree rooted at `base_branch`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Fragment {
    /// Root of the fragment's subtree, when the fragment has one.
    pub base_branch: Option<BranchId>,
    pub includes: Vec<BranchId>,
    pub excludes: Vec<BranchId>,
    /// Anchor position of the fragment in tree space.
    pub offset: Vec3,
    /// Hierarchy level the fragment starts at.
    pub min_level: usize,
}

impl Fragment {
    pub fn has_includes_or_excludes(&self) -> bool {
        !self.includes.is_empty() || !self.excludes.is_empty()
    }

    /// Content hash over the owning descriptor id, base branch and the
    /// sorted include/exclude sets. Stable across runs and platforms, so
    /// the texture exporter can key its cache on it.
    pub fn content_hash(&self, owner_id: u32) -> u64 {
        let mut includes = self.includes.clone();
        let mut excludes = self.excludes.clone();
        includes.sort_unstable();
        excludes.sort_unstable();
        let mut hashable = format!(
            "{}:{}-i:",
            owner_id,
            self.base_branch.map(|b| b as i64).unwrap_or(-1)
        );
        for id in includes {
            hashable.push_str(&id.to_string());
            hashable.push(',');
        }
        hashable.push_str("e:");
        for id in excludes {
            hashable.push_str(&id.to_string());
            hashable.push(',');
        }
        xxh3_64(hashable.as_bytes())
    }
}

/// How snapshot fragments are carved out of the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FragmentBias {
    /// One fragment per root branch covering its whole subtree.
    #[default]
    None,
    /// Group each root's children by lateral alignment; outliers become
    /// their own child fragments.
    PlaneAlignment,
}

/// Tunables for the plane-alignment bias.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FragmentBiasConfig {
    /// Acceptance window per LOD: tighter at LOD 0, looser above. The last
    /// entry covers every higher LOD.
    pub lod_thresholds: [f32; 3],
    /// Lateral (x) direction range the window is laid over.
    pub min_plane_align: f32,
    pub max_plane_align: f32,
}

impl Default for FragmentBiasConfig {
    fn default() -> Self {
        Self {
            lod_thresholds: [0.17, 0.5, 0.7],
            min_plane_align: -1.0,
            max_plane_align: 1.0,
        }
    }
}

/// Context for deriving fragments and polygon areas from one finished
/// tree/mesh pair.
pub struct FragmentBuilder<'a> {
    pub(crate) tree: &'a BranchTree,
    pub(crate) mesh: &'a MeshDescriptor,
    pub(crate) scale: f32,
    pub bias: FragmentBias,
    pub bias_config: FragmentBiasConfig,
    pub simplify_enabled: bool,
}

impl<'a> FragmentBuilder<'a> {
    /// Binds the builder to a finished tree and its rendered-mesh
    /// descriptor; `scale` converts tree units to texture units.
    pub fn new(tree: &'a BranchTree, mesh: &'a MeshDescriptor, scale: f32) -> Self {
        Self {
            tree,
            mesh,
            scale,
            bias: FragmentBias::None,
            bias_config: FragmentBiasConfig::default(),
            simplify_enabled: true,
        }
    }

    /// Generates the snapshot fragments for a LOD, dispatching on the bias
    /// mode.
    pub fn generate_fragments(&self, lod: usize) -> Vec<Fragment> {
        match self.bias {
            FragmentBias::None => self.generate_non_bias_fragments(),
            FragmentBias::PlaneAlignment => self.generate_plane_alignment_fragments(lod),
        }
    }

    /// One fragment per root branch, covering its whole subtree.
    pub fn generate_non_bias_fragments(&self) -> Vec<Fragment> {
        self.tree
            .roots()
            .iter()
            .map(|&root| Fragment {
                base_branch: Some(root),
                offset: self.tree.branches[root].origin,
                min_level: 0,
                ..Fragment::default()
            })
            .collect()
    }

    /// Groups each root's children by lateral direction: the largest
    /// contiguous run inside the LOD window stays in the root's fragment,
    /// every other child becomes a singleton child fragment at hierarchy
    /// level 1. The first maximal run found wins ties.
    pub fn generate_plane_alignment_fragments(&self, lod: usize) -> Vec<Fragment> {
        let config = &self.bias_config;
        let threshold = config.lod_thresholds[lod.min(config.lod_thresholds.len() - 1)];
        let range = config.max_plane_align - config.min_plane_align;
        let mid = config.min_plane_align + range * 0.5;
        let window_min = mid - range * 0.5 * threshold;
        let window_max = mid + range * 0.5 * threshold;

        let mut fragments = Vec::new();
        for &root in self.tree.roots() {
            let mut children = self.tree.branches[root].children.clone();
            children.sort_by(|&a, &b| {
                self.tree.branches[a]
                    .direction
                    .x
                    .total_cmp(&self.tree.branches[b].direction.x)
            });

            // Largest contiguous run of children whose rescaled lateral
            // positions stay within the threshold of the run's start.
            let positions: Vec<f32> = children
                .iter()
                .map(|&c| inverse_lerp(window_min, window_max, self.tree.branches[c].direction.x))
                .collect();
            let mut plane_group: Vec<BranchId> = Vec::new();
            for i in 0..children.len() {
                let mut candidate = vec![children[i]];
                for j in (i + 1)..children.len() {
                    if positions[j] - positions[i] < threshold {
                        candidate.push(children[j]);
                    } else {
                        break;
                    }
                }
                if candidate.len() > plane_group.len() {
                    plane_group = candidate;
                }
            }

            let out_children: Vec<BranchId> = children
                .iter()
                .copied()
                .filter(|c| !plane_group.contains(c))
                .collect();

            fragments.push(Fragment {
                base_branch: Some(root),
                excludes: out_children.clone(),
                offset: self.tree.branches[root].origin,
                min_level: 0,
                ..Fragment::default()
            });
            for child in out_children {
                fragments.push(Fragment {
                    base_branch: None,
                    includes: vec![child],
                    offset: self.tree.branches[child].point_at(0.0),
                    min_level: 1,
                    ..Fragment::default()
                });
            }
        }
        fragments
    }

    /// Branch ids a fragment covers: its base subtree (or the included
    /// subtrees) minus every excluded subtree.
    pub fn branch_ids_of(&self, fragment: &Fragment) -> Vec<BranchId> {
        if fragment.includes.is_empty() {
            match fragment.base_branch {
                Some(base) => {
                    let mut out = Vec::new();
                    self.collect_minus_excludes(base, &fragment.excludes, &mut out);
                    out
                }
                None => self.filtered_branches(&fragment.includes, &fragment.excludes),
            }
        } else {
            self.filtered_branches(&fragment.includes, &fragment.excludes)
        }
    }

    fn collect_minus_excludes(&self, id: BranchId, excludes: &[BranchId], out: &mut Vec<BranchId>) {
        if excludes.contains(&id) {
            return;
        }
        out.push(id);
        for &child in &self.tree.branches[id].children {
            self.collect_minus_excludes(child, excludes, out);
        }
    }

    /// Filters the whole tree through include/exclude sets: with no
    /// includes everything is in scope; an include admits its whole
    /// subtree; an exclude prunes its whole subtree.
    pub fn filtered_branches(&self, includes: &[BranchId], excludes: &[BranchId]) -> Vec<BranchId> {
        let mut out = Vec::new();
        for &root in self.tree.roots() {
            self.filter_recursive(root, includes, excludes, includes.is_empty(), &mut out);
        }
        out
    }

    fn filter_recursive(
        &self,
        id: BranchId,
        includes: &[BranchId],
        excludes: &[BranchId],
        in_include: bool,
        out: &mut Vec<BranchId>,
    ) {
        if !in_include {
            let now_included = includes.contains(&id);
            if now_included {
                if excludes.contains(&id) {
                    return;
                }
                out.push(id);
            }
            for &child in &self.tree.branches[id].children {
                self.filter_recursive(child, includes, excludes, now_included, out);
            }
        } else {
            if excludes.contains(&id) {
                return;
            }
            out.push(id);
            for &child in &self.tree.branches[id].children {
                self.filter_recursive(child, includes, excludes, true, out);
            }
        }
    }

    /// Base and terminal sample points of a filtered section: branches at
    /// the section's entry level contribute their base point, deeper leaf
    /// branches their tip.
    pub(crate) fn outline_points(
        &self,
        includes: &[BranchId],
        excludes: &[BranchId],
    ) -> (Vec<Vec3>, Vec<BranchId>) {
        let ids = self.filtered_branches(includes, excludes);
        let mut points = Vec::new();
        let mut min_level: Option<usize> = None;
        for &id in &ids {
            let level = self.tree.level_of(id);
            let branch = &self.tree.branches[id];
            if min_level.is_none() || min_level == Some(level) {
                min_level = Some(level);
                points.push(branch.point_at(0.0));
            } else if branch.children.is_empty() {
                points.push(branch.point_at(1.0));
            }
        }
        (points, ids)
    }

    /// Sprout tip sample points over a set of branches.
    pub(crate) fn sprout_points(&self, ids: &[BranchId], length_scale: f32) -> Vec<Vec3> {
        let mut points = Vec::new();
        for &id in ids {
            let branch = &self.tree.branches[id];
            for sprout in &branch.sprouts {
                if sprout.mesh_height > 0.0 {
                    points.push(
                        branch.point_at(sprout.position)
                            + sprout.direction.normalize_or_zero()
                                * sprout.mesh_height
                                * length_scale,
                    );
                }
            }
        }
        points
    }
}
