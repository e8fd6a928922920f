//! Procedural tree generation pipeline engine.
//!
//! A declarative, reorderable chain of stages builds a tree's 3D branch
//! structure, and flat geometric regions are derived from it for texture
//! baking.
//!
//! Main components:
//! - [`tree`] — the shared branch tree data model.
//! - [`lsystem`] — grammar-based structure generation (rewrite rules to a
//!   ray skeleton).
//! - [`stage`], [`graph`] — typed pipeline stages and the validated,
//!   weight-ordered stage chain.
//! - [`control`], [`runner`] — per-run change tracking and the processor
//!   dispatch that (re)computes each aspect of the tree.
//! - [`fragment`], [`polygon`] — branch subsets and their triangulated,
//!   UV-mapped 2D hulls for atlas packing.
//! - [`hull`], [`triangulate`] — the convex-hull and Delaunay machinery
//!   behind the polygon builder.
//! - [`geom`], [`log`], [`types`] — shared helpers, the bounded log queue
//!   and id aliases.

pub mod control;
pub mod fragment;
pub mod geom;
pub mod graph;
pub mod hull;
pub mod log;
pub mod lsystem;
pub mod polygon;
pub mod runner;
pub mod stage;
pub mod tree;
pub mod triangulate;
pub mod types;
