//! Incremental comment-tree reconciliation
//!
//! Turns a nested reply tree into a depth-annotated sequence, isolates
//! genuinely new comments between two snapshots by id, and inserts them into
//! the live display list at the correct hierarchical position, without ever
//! rebuilding or reordering what is already on screen.

use crate::model::Comment;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// How long a freshly inserted comment keeps its "new" highlight. The deadline
/// is computed once per batch, so a whole update fades together.
pub const FRESH_HIGHLIGHT: Duration = Duration::from_secs(3);

/// A comment paired with its nesting depth, in pre-order position.
#[derive(Debug, Clone)]
pub struct FlatComment {
    pub comment: Comment,
    pub depth: usize,
}

impl FlatComment {
    fn created(&self) -> i64 {
        self.comment.created.unwrap_or(0)
    }
}

/// Depth-first pre-order flattening: each node immediately precedes its own
/// subtree, which precedes its next sibling. No node is dropped or reordered.
pub fn flatten(roots: &[Comment], base_depth: usize) -> Vec<FlatComment> {
    let mut out = Vec::new();
    flatten_into(roots, base_depth, &mut out);
    out
}

fn flatten_into(nodes: &[Comment], depth: usize, out: &mut Vec<FlatComment>) {
    for node in nodes {
        out.push(FlatComment {
            comment: node.clone(),
            depth,
        });
        if !node.replies.is_empty() {
            flatten_into(&node.replies, depth + 1, out);
        }
    }
}

/// Entries of `current` whose id is non-empty and absent from `previous`,
/// in `current`'s order. Comments without an id cannot be deduplicated and
/// are never classified as new.
pub fn diff_new(previous: &[FlatComment], current: &[FlatComment]) -> Vec<FlatComment> {
    let seen: HashSet<&str> = previous
        .iter()
        .map(|item| item.comment.id.as_str())
        .filter(|id| !id.is_empty())
        .collect();

    current
        .iter()
        .filter(|item| !item.comment.id.is_empty() && !seen.contains(item.comment.id.as_str()))
        .cloned()
        .collect()
}

/// One materialized comment in the live display.
#[derive(Debug, Clone)]
pub struct DisplayEntry {
    pub comment: Comment,
    pub depth: usize,
    fresh_until: Option<Instant>,
}

impl DisplayEntry {
    pub fn is_fresh(&self, now: Instant) -> bool {
        self.fresh_until.is_some_and(|deadline| now < deadline)
    }
}

/// The ordered display state: entries in on-screen order plus an id -> position
/// index maintained on every insertion, so parent lookups never scan the list.
///
/// Duplicate ids are undefined behavior upstream; the index keeps the first
/// occurrence it sees.
#[derive(Debug, Default)]
pub struct DisplayList {
    entries: Vec<DisplayEntry>,
    positions: HashMap<String, usize>,
}

impl DisplayList {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[DisplayEntry] {
        &self.entries
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.positions.clear();
    }

    fn push_back(&mut self, entry: DisplayEntry) {
        let index = self.entries.len();
        if !entry.comment.id.is_empty() {
            self.positions
                .entry(entry.comment.id.clone())
                .or_insert(index);
        }
        self.entries.push(entry);
    }

    fn insert_at(&mut self, index: usize, entry: DisplayEntry) {
        debug_assert!(index <= self.entries.len());
        for position in self.positions.values_mut() {
            if *position >= index {
                *position += 1;
            }
        }
        if !entry.comment.id.is_empty() {
            self.positions
                .entry(entry.comment.id.clone())
                .or_insert(index);
        }
        self.entries.insert(index, entry);
    }

    /// Drop highlight state for entries whose deadline has passed.
    pub fn expire_fresh(&mut self, now: Instant) {
        for entry in &mut self.entries {
            if entry.fresh_until.is_some_and(|deadline| deadline <= now) {
                entry.fresh_until = None;
            }
        }
    }
}

/// Where a new item goes relative to the current display.
///
/// `OrphanFront` is the fallback for a reply whose parent is not on screen;
/// it places the reply like a top-level item but stays distinguishable for
/// diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Front,
    OrphanFront,
    Before(usize),
    After(usize),
}

/// Compute the insertion anchor for one new item.
///
/// Top-level items go to the very front (newest-first presentation). For a
/// reply, the parent is looked up by stripped id; from just after it, the scan
/// moves forward until an entry shallower than the new item, which marks the
/// end of the slot the reply belongs in. If the scan exhausts the list the
/// reply lands immediately after its parent, ahead of existing siblings.
pub fn resolve_insertion_point(item: &FlatComment, display: &DisplayList) -> Anchor {
    if item.depth == 0 {
        return Anchor::Front;
    }

    let Some(parent_id) = item.comment.parent_key() else {
        return Anchor::OrphanFront;
    };
    let Some(parent_pos) = display.position_of(parent_id) else {
        return Anchor::OrphanFront;
    };

    let mut cursor = parent_pos + 1;
    while cursor < display.len() {
        if display.entries()[cursor].depth < item.depth {
            return Anchor::Before(cursor);
        }
        cursor += 1;
    }
    Anchor::After(parent_pos)
}

/// Order a batch of simultaneously discovered items for insertion: top-level
/// items first (newest created first, each prepended in turn), then replies by
/// ascending depth so a deeper reply's parent is already placed, ties newest
/// first.
pub fn order_batch(batch: Vec<FlatComment>) -> Vec<FlatComment> {
    let (mut top_level, mut replies): (Vec<_>, Vec<_>) =
        batch.into_iter().partition(|item| item.depth == 0);

    top_level.sort_by(|a, b| b.created().cmp(&a.created()));
    replies.sort_by(|a, b| {
        a.depth
            .cmp(&b.depth)
            .then_with(|| b.created().cmp(&a.created()))
    });

    top_level.extend(replies);
    top_level
}

/// What one incremental pass did to the display.
#[derive(Debug, Default)]
pub struct InsertReport {
    /// Index each new entry landed at, in insertion order.
    pub positions: Vec<usize>,
    /// Replies that fell back to the front because their parent was missing.
    pub orphaned: usize,
}

/// Clear the display and materialize the whole flattened tree in order.
/// Only called while the view shows a placeholder (first load or recovery).
pub fn full_render(display: &mut DisplayList, roots: &[Comment]) {
    display.clear();
    for item in flatten(roots, 0) {
        display.push_back(DisplayEntry {
            comment: item.comment,
            depth: item.depth,
            fresh_until: None,
        });
    }
}

/// Insert a batch of new items at their resolved anchors. Existing entries are
/// never removed, reordered, or mutated; every insert carries the shared
/// freshness deadline for the batch.
pub fn apply_update(
    display: &mut DisplayList,
    batch: Vec<FlatComment>,
    fresh_until: Instant,
) -> InsertReport {
    let mut report = InsertReport::default();

    for item in order_batch(batch) {
        let index = match resolve_insertion_point(&item, display) {
            Anchor::Front => 0,
            Anchor::OrphanFront => {
                tracing::warn!(
                    id = %item.comment.id,
                    parent = ?item.comment.parent_key(),
                    "parent not on screen, prepending reply"
                );
                report.orphaned += 1;
                0
            }
            Anchor::Before(at) => at,
            Anchor::After(at) => at + 1,
        };

        display.insert_at(
            index,
            DisplayEntry {
                comment: item.comment,
                depth: item.depth,
                fresh_until: Some(fresh_until),
            },
        );
        report.positions.push(index);
    }

    report
}
