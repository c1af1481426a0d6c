//! Tag-driven mind-map pruning and hierarchical spreadsheet planning.
//!
//! A mind-map document is loaded into a forest of [`domain::Node`] trees,
//! pruned to the nodes carrying (or leading to) selected tags, flattened into
//! path-labeled [`domain::Record`]s, re-nested into a [`domain::GroupTree`] and
//! laid out as a [`domain::SheetPlan`] with merged multi-row cells per column.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
