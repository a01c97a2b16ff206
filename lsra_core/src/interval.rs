//! Live intervals: ranges, use records and split chains.
//!
//! An interval is built backwards, so ranges are mostly inserted at the
//! front. Ranges stay sorted and disjoint; touching ranges are coalesced.
//!
//! Splitting moves everything at or after the split position into a new
//! segment. All segments of one value form a chain owned by the head
//! interval: the head keeps a list of child ids sorted by start position.

use std::fmt;

use lsra_ir::NodeRef;

use crate::position::Position;
use crate::{GroupId, Operand};

/// A half-open position range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveRange {
    pub start: Position,
    pub end: Position,
}

impl LiveRange {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.start <= pos && pos < self.end
    }
}

impl fmt::Display for LiveRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A point where the value is read or written, and the constraint there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Use {
    pub pos: Position,
    pub operand: Operand,
}

/// Index of an interval in the [`Intervals`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntervalId(pub(crate) u32);

impl IntervalId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for IntervalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// Liveness and allocation record of one value segment (or of one physical
/// register's reservation track).
#[derive(Debug, Clone)]
pub struct Interval {
    node: Option<NodeRef>,
    parent: Option<IntervalId>,
    children: Vec<IntervalId>,
    ranges: Vec<LiveRange>,
    uses: Vec<Use>,
    fixed_uses: Vec<Use>,
    group: Option<GroupId>,
    value: Option<Operand>,
    alive: bool,
}

impl Interval {
    pub fn new(node: Option<NodeRef>) -> Self {
        Self {
            node,
            parent: None,
            children: Vec::new(),
            ranges: Vec::new(),
            uses: Vec::new(),
            fixed_uses: Vec::new(),
            group: None,
            value: None,
            alive: true,
        }
    }

    pub fn node(&self) -> Option<NodeRef> {
        self.node
    }

    /// Head of the split chain, `None` for a head.
    pub fn parent(&self) -> Option<IntervalId> {
        self.parent
    }

    /// Split-off segments, sorted by start. Only heads have children.
    pub fn children(&self) -> &[IntervalId] {
        &self.children
    }

    pub fn ranges(&self) -> &[LiveRange] {
        &self.ranges
    }

    pub fn uses(&self) -> &[Use] {
        &self.uses
    }

    pub fn fixed_uses(&self) -> &[Use] {
        &self.fixed_uses
    }

    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    pub fn set_group(&mut self, group: GroupId) {
        self.group = Some(group);
    }

    pub fn value(&self) -> Option<Operand> {
        self.value
    }

    pub fn set_value(&mut self, value: Operand) {
        self.value = Some(value);
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Freeze the interval: it no longer takes part in allocation.
    pub fn kill(&mut self) {
        self.alive = false;
    }

    /// First covered position (0 for an empty interval).
    pub fn start(&self) -> Position {
        self.ranges.first().map_or(0, |r| r.start)
    }

    /// One past the last covered position (0 for an empty interval).
    pub fn end(&self) -> Position {
        self.ranges.last().map_or(0, |r| r.end)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn covers(&self, pos: Position) -> bool {
        let i = self.ranges.partition_point(|r| r.end <= pos);
        self.ranges.get(i).is_some_and(|r| r.contains(pos))
    }

    /// Add `[start, end)`, merging with every range it overlaps or touches.
    pub fn fill_range(&mut self, start: Position, end: Position) {
        if start >= end {
            return;
        }
        let lo = self.ranges.partition_point(|r| r.end < start);
        let hi = self.ranges.partition_point(|r| r.start <= end);
        if lo == hi {
            self.ranges.insert(lo, LiveRange::new(start, end));
            return;
        }
        let merged = LiveRange::new(
            start.min(self.ranges[lo].start),
            end.max(self.ranges[hi - 1].end),
        );
        self.ranges.splice(lo..hi, [merged]);
    }

    /// Move the start of the first range to a definition point.
    pub fn update_start(&mut self, pos: Position) {
        if let Some(first) = self.ranges.first_mut() {
            debug_assert!(pos < first.end, "definition at {pos} after {first}");
            first.start = pos;
        }
    }

    /// Record a use; fixed-register constraints are also tracked separately.
    pub fn use_at(&mut self, pos: Position, operand: Operand) {
        let u = Use { pos, operand };
        let at = self.uses.partition_point(|x| x.pos <= pos);
        self.uses.insert(at, u);
        if operand.is_fixed() {
            let at = self.fixed_uses.partition_point(|x| x.pos <= pos);
            self.fixed_uses.insert(at, u);
        }
    }

    /// Detach everything at or after `pos` into a new segment of `head`.
    fn split_off(&mut self, pos: Position, head: IntervalId) -> Interval {
        let idx = self.ranges.partition_point(|r| r.end <= pos);
        let mut ranges = self.ranges.split_off(idx);
        if let Some(first) = ranges.first_mut()
            && first.start < pos
        {
            self.ranges.push(LiveRange::new(first.start, pos));
            first.start = pos;
        }

        let at = self.uses.partition_point(|u| u.pos < pos);
        let uses = self.uses.split_off(at);
        let at = self.fixed_uses.partition_point(|u| u.pos < pos);
        let fixed_uses = self.fixed_uses.split_off(at);

        Interval {
            node: self.node,
            parent: Some(head),
            children: Vec::new(),
            ranges,
            uses,
            fixed_uses,
            group: self.group,
            value: None,
            alive: true,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(node) = self.node {
            write!(f, "{node} ")?;
        }
        for r in &self.ranges {
            write!(f, "{r}")?;
        }
        if let Some(value) = self.value {
            write!(f, " => {value}")?;
        }
        if !self.alive {
            write!(f, " (dead)")?;
        }
        Ok(())
    }
}

/// Arena of value intervals. The first `heads` entries are the chain heads of
/// the graph's nodes (indexed by node); split segments are appended after.
#[derive(Debug, Default)]
pub struct Intervals {
    arena: Vec<Interval>,
    heads: usize,
}

impl Intervals {
    pub fn new(node_count: usize) -> Self {
        Self {
            arena: (0..node_count as u32)
                .map(|i| Interval::new(Some(NodeRef::new(i))))
                .collect(),
            heads: node_count,
        }
    }

    /// Number of chain heads (one per node).
    pub fn heads(&self) -> usize {
        self.heads
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn head(&self, node: NodeRef) -> IntervalId {
        IntervalId(node.index())
    }

    pub fn get(&self, id: IntervalId) -> &Interval {
        &self.arena[id.index()]
    }

    pub fn get_mut(&mut self, id: IntervalId) -> &mut Interval {
        &mut self.arena[id.index()]
    }

    pub fn of(&self, node: NodeRef) -> &Interval {
        self.get(self.head(node))
    }

    pub fn of_mut(&mut self, node: NodeRef) -> &mut Interval {
        let id = self.head(node);
        self.get_mut(id)
    }

    /// Split segment `id` at `pos`; the new segment owns everything at or
    /// after `pos` and is linked into the chain of `id`'s head.
    ///
    /// `pos` must lie strictly between the segment's start and end.
    pub fn split(&mut self, id: IntervalId, pos: Position) -> IntervalId {
        let head = self.get(id).parent.unwrap_or(id);
        let child = IntervalId(self.arena.len() as u32);
        let tail = self.arena[id.index()].split_off(pos, head);
        debug_assert!(!tail.is_empty(), "split of {id} at {pos} produced an empty segment");
        let start = tail.start();
        self.arena.push(tail);

        let children = &self.arena[head.index()].children;
        let at = children.partition_point(|c| self.arena[c.index()].start() <= start);
        self.arena[head.index()].children.insert(at, child);
        child
    }

    /// The head followed by its children, in position order.
    pub fn chain(&self, head: IntervalId) -> impl Iterator<Item = IntervalId> + '_ {
        std::iter::once(head).chain(self.get(head).children.iter().copied())
    }

    /// The segment of `node`'s chain active at `pos`: the last segment that
    /// starts at or before `pos`, or the head if none does.
    pub fn child_at(&self, node: NodeRef, pos: Position) -> IntervalId {
        let head = self.head(node);
        let children = &self.get(head).children;
        let n = children.partition_point(|c| self.get(*c).start() <= pos);
        if n == 0 { head } else { children[n - 1] }
    }

    /// Location of `node` at `pos`, if its active segment has one.
    pub fn value_at(&self, node: NodeRef, pos: Position) -> Option<Operand> {
        self.get(self.child_at(node, pos)).value
    }
}
