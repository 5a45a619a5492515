//! Pure level logic for Nightwatch.
//!
//! This crate generates stealth-infiltration levels (a node graph laid over a
//! grid of regions, with long-range backdoor shortcuts), checks them against
//! the level-design constraints, and scores them by simulating a greedy
//! player against alert-driven patrols. Functions take plain data and an
//! injectable `rand::Rng` and return plain data, so everything is
//! deterministic under a seeded generator.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`backdoors`] | Three-pass backdoor placement, forward/lateral classification |
//! | [`config`] | Layout, generation, simulation and batch configuration + validation |
//! | [`constants`] | Shipped defaults (grid, node count, patrol tuning) |
//! | [`edges`] | Spanning trees, nearest-neighbour extras, region bridges |
//! | [`error`] | Error enums for configuration, graph structure and simulation |
//! | [`evaluation`] | Batch runs (sequential and rayon) and outcome statistics |
//! | [`generation`] | Generation pipeline and the generate-validate retry loop |
//! | [`graph`] | Graph data model, adjacency, BFS hop distances, summary |
//! | [`nodes`] | Jittered node distribution, start/goal roles |
//! | [`patrol`] | Patrol records, spawning, despawning and movement |
//! | [`perception`] | Headings, vision cones, control map |
//! | [`regions`] | Region grid layout and labels |
//! | [`simulation`] | Turn loop, player heuristic, outcomes and traces |
//! | [`snapshot`] | JSON export and versioned bincode save/load |
//! | [`validation`] | Backdoor checks, pruning, articulation points, repair |

pub mod backdoors;
pub mod config;
pub mod constants;
pub mod edges;
pub mod error;
pub mod evaluation;
pub mod generation;
pub mod graph;
pub mod nodes;
pub mod patrol;
pub mod perception;
pub mod regions;
pub mod simulation;
pub mod snapshot;
pub mod validation;
