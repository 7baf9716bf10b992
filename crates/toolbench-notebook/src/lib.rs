//! Cell-level diff review navigation for notebook edit sessions.
//!
//! The diffs themselves are computed elsewhere; this crate keeps a sorted
//! view of per-cell changes and supports forward/backward navigation with
//! wraparound, hunk-level stepping inside modified cells, and the
//! accept-and-advance review flow.

pub mod navigator;

pub use navigator::{
    CellChange, CellChangeKind, LineHunk, NavigationTarget, NotebookDiffNavigator, ResolvedChange,
};
