//! Navigation over a sorted sequence of per-cell change descriptors.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Kind of change a cell carries in the proposed edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellChangeKind {
    /// Cell was inserted.
    Insert,
    /// Cell was deleted.
    Delete,
    /// Cell content was modified; carries line-level hunks.
    Modified,
    /// Cell is untouched; skipped by navigation.
    Unchanged,
}

/// One line-level hunk inside a modified cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineHunk {
    /// First changed line in the original cell text.
    pub original_start: u32,
    /// Changed line count on the original side.
    pub original_len: u32,
    /// First changed line in the modified cell text.
    pub modified_start: u32,
    /// Changed line count on the modified side.
    pub modified_len: u32,
}

/// A per-cell change descriptor.
///
/// `ordinal` is the cell's position in the diffed notebook; the navigator
/// keeps its sequence sorted by it. Hunks are only meaningful for
/// `Modified` cells and are re-settable as the underlying diff
/// re-evaluates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellChange {
    /// Stable handle of the cell.
    pub cell_handle: u64,
    /// Position of the cell in the diffed notebook.
    pub ordinal: u32,
    /// What happened to the cell.
    pub kind: CellChangeKind,
    /// Line hunks of a modified cell.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hunks: Vec<LineHunk>,
}

impl CellChange {
    /// Create a change without hunks.
    #[must_use]
    pub const fn new(cell_handle: u64, ordinal: u32, kind: CellChangeKind) -> Self {
        Self {
            cell_handle,
            ordinal,
            kind,
            hunks: Vec::new(),
        }
    }

    /// Create a modified-cell change with its hunks.
    #[must_use]
    pub const fn modified(cell_handle: u64, ordinal: u32, hunks: Vec<LineHunk>) -> Self {
        Self {
            cell_handle,
            ordinal,
            kind: CellChangeKind::Modified,
            hunks,
        }
    }
}

/// Where navigation landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationTarget {
    /// Handle of the cell to reveal.
    pub cell_handle: u64,
    /// Kind of the change revealed.
    pub kind: CellChangeKind,
    /// The hunk to reveal inside the cell; absent when navigation is at
    /// whole-cell granularity (non-modified change, or editor detached).
    pub hunk: Option<LineHunk>,
}

/// Outcome of accepting or rejecting the nearest change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedChange {
    /// Handle of the cell whose change was resolved.
    pub cell_handle: u64,
    /// Kind of the resolved change.
    pub kind: CellChangeKind,
    /// Where navigation advanced to afterwards, if any change remains.
    pub next: Option<NavigationTarget>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Position {
    change_index: usize,
    hunk_index: Option<usize>,
}

/// Sorted view of cell changes with hunk-level stepping.
///
/// Intra-cell stepping requires the cell's editor to be attached; a
/// modified cell whose editor is detached degrades to whole-cell
/// granularity until [`NotebookDiffNavigator::set_editor_attached`] flips
/// it back.
#[derive(Debug, Default)]
pub struct NotebookDiffNavigator {
    changes: Vec<CellChange>,
    attached: HashSet<u64>,
    position: Option<Position>,
}

impl NotebookDiffNavigator {
    /// Create a navigator over the given changes, sorted by ordinal.
    #[must_use]
    pub fn new(mut changes: Vec<CellChange>) -> Self {
        changes.sort_by_key(|c| c.ordinal);
        Self {
            changes,
            attached: HashSet::new(),
            position: None,
        }
    }

    /// The changes in navigation order.
    #[must_use]
    pub fn changes(&self) -> &[CellChange] {
        &self.changes
    }

    /// Number of navigable (non-unchanged) changes.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| c.kind != CellChangeKind::Unchanged)
            .count()
    }

    /// Where navigation currently points.
    #[must_use]
    pub fn current(&self) -> Option<NavigationTarget> {
        self.position.map(|pos| self.target_at(pos))
    }

    /// Replace a modified cell's hunks after the diff re-evaluated.
    pub fn set_cell_diff(&mut self, cell_handle: u64, hunks: Vec<LineHunk>) {
        let Some(index) = self.changes.iter().position(|c| c.cell_handle == cell_handle) else {
            tracing::debug!(cell_handle, "Diff update for unknown cell");
            return;
        };
        self.changes[index].hunks = hunks;

        // Keep the cursor inside the new hunk range.
        if let Some(pos) = &mut self.position {
            if pos.change_index == index {
                let len = self.changes[index].hunks.len();
                pos.hunk_index = match pos.hunk_index {
                    Some(_) if len == 0 => None,
                    Some(i) if i >= len => Some(len - 1),
                    other => other,
                };
            }
        }
    }

    /// Track whether a cell's editor is attached.
    ///
    /// Detaching the cell under the cursor collapses the cursor to
    /// whole-cell granularity; attaching it enters the first hunk.
    pub fn set_editor_attached(&mut self, cell_handle: u64, attached: bool) {
        if attached {
            self.attached.insert(cell_handle);
        } else {
            self.attached.remove(&cell_handle);
        }

        if let Some(pos) = self.position {
            if self.changes[pos.change_index].cell_handle == cell_handle {
                let hunk_index = if attached && self.sub_navigable(pos.change_index) {
                    Some(0)
                } else {
                    None
                };
                self.position = Some(Position {
                    change_index: pos.change_index,
                    hunk_index,
                });
            }
        }
    }

    /// Jump to the first (or last) non-unchanged change.
    pub fn reveal(&mut self, first: bool) -> Option<NavigationTarget> {
        let index = if first {
            self.find_navigable(0, true)?
        } else {
            self.find_navigable(self.changes.len().checked_sub(1)?, false)?
        };
        self.position = Some(self.enter(index, first));
        self.current()
    }

    /// Advance to the next hunk or change.
    ///
    /// Steps through the current modified cell's hunks first; after the
    /// last change, `wrap` controls cycling back to the start.
    pub fn next(&mut self, wrap: bool) -> Option<NavigationTarget> {
        let Some(pos) = self.position else {
            return self.reveal(true);
        };

        if let Some(i) = pos.hunk_index {
            if self.sub_navigable(pos.change_index)
                && i + 1 < self.changes[pos.change_index].hunks.len()
            {
                self.position = Some(Position {
                    change_index: pos.change_index,
                    hunk_index: Some(i + 1),
                });
                return self.current();
            }
        }

        let from_next = pos
            .change_index
            .checked_add(1)
            .filter(|&i| i < self.changes.len())
            .and_then(|i| self.find_navigable(i, true));
        let index = match from_next {
            Some(i) => i,
            None if wrap => self.find_navigable(0, true)?,
            None => return None,
        };

        self.position = Some(self.enter(index, true));
        self.current()
    }

    /// Step back to the previous hunk or change.
    pub fn previous(&mut self, wrap: bool) -> Option<NavigationTarget> {
        let Some(pos) = self.position else {
            return self.reveal(false);
        };

        if let Some(i) = pos.hunk_index {
            if i > 0 && self.sub_navigable(pos.change_index) {
                self.position = Some(Position {
                    change_index: pos.change_index,
                    hunk_index: Some(i - 1),
                });
                return self.current();
            }
        }

        let from_prev = pos
            .change_index
            .checked_sub(1)
            .and_then(|i| self.find_navigable(i, false));
        let index = match from_prev {
            Some(i) => i,
            None if wrap => self.find_navigable(self.changes.len() - 1, false)?,
            None => return None,
        };

        self.position = Some(self.enter(index, false));
        self.current()
    }

    /// Accept the nearest change and advance to the next one.
    pub fn accept_nearest(&mut self) -> Option<ResolvedChange> {
        let resolved = self.resolve_nearest()?;
        tracing::debug!(cell_handle = resolved.cell_handle, "Accepted cell change");
        Some(resolved)
    }

    /// Reject the nearest change and advance to the next one.
    pub fn reject_nearest(&mut self) -> Option<ResolvedChange> {
        let resolved = self.resolve_nearest()?;
        tracing::debug!(cell_handle = resolved.cell_handle, "Rejected cell change");
        Some(resolved)
    }

    fn resolve_nearest(&mut self) -> Option<ResolvedChange> {
        let index = match self.position {
            Some(pos) => pos.change_index,
            None => self.find_navigable(0, true)?,
        };
        if self.changes[index].kind == CellChangeKind::Unchanged {
            return None;
        }

        let removed = self.changes.remove(index);
        self.position = None;
        self.attached.remove(&removed.cell_handle);

        // The change that followed the removed one now sits at its index.
        let next = if self.changes.is_empty() {
            None
        } else {
            let start = index.min(self.changes.len() - 1);
            self.find_navigable(start, true)
                .or_else(|| self.find_navigable(0, true))
                .map(|i| {
                    let pos = self.enter(i, true);
                    self.position = Some(pos);
                    self.target_at(pos)
                })
        };

        Some(ResolvedChange {
            cell_handle: removed.cell_handle,
            kind: removed.kind,
            next,
        })
    }

    /// Scan for a navigable change from `start`, forward or backward.
    fn find_navigable(&self, start: usize, forward: bool) -> Option<usize> {
        if self.changes.is_empty() || start >= self.changes.len() {
            return None;
        }
        let mut index = start;
        loop {
            if self.changes[index].kind != CellChangeKind::Unchanged {
                return Some(index);
            }
            if forward {
                index += 1;
                if index == self.changes.len() {
                    return None;
                }
            } else {
                index = index.checked_sub(1)?;
            }
        }
    }

    /// Enter a change from the front or the back.
    fn enter(&self, index: usize, forward: bool) -> Position {
        let hunk_index = if self.sub_navigable(index) {
            if forward {
                Some(0)
            } else {
                Some(self.changes[index].hunks.len() - 1)
            }
        } else {
            None
        };
        Position {
            change_index: index,
            hunk_index,
        }
    }

    /// Whether a change supports intra-cell stepping right now.
    fn sub_navigable(&self, index: usize) -> bool {
        let change = &self.changes[index];
        change.kind == CellChangeKind::Modified
            && !change.hunks.is_empty()
            && self.attached.contains(&change.cell_handle)
    }

    fn target_at(&self, pos: Position) -> NavigationTarget {
        let change = &self.changes[pos.change_index];
        NavigationTarget {
            cell_handle: change.cell_handle,
            kind: change.kind,
            hunk: pos.hunk_index.and_then(|i| change.hunks.get(i).copied()),
        }
    }
}
