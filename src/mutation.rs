//! Structural edits addressed by vertex identity.
//!
//! Cut points are [`VertexId`]s rather than coordinates so that repeated
//! locations stay unambiguous. A cut point that is not in the chain, including
//! an id issued by a different chain, turns the call into a no-op returning 0
//! (or `None`); it is never an error.

use log::debug;

use crate::chain::{DualChain, VertexId, VertexKey};
use crate::vertex::Vertex;

impl DualChain {
    /// Drop every vertex strictly before `vertex`, making it the new head.
    /// Returns the number of vertices removed.
    pub fn trim_before(&mut self, vertex: VertexId) -> usize {
        let Some(key) = self.key(vertex) else {
            return 0;
        };
        let (Some(first), Some(last)) = (self.first_vertex, self.vertices[key].prev) else {
            return 0;
        };
        let removed = self.remove_span(first, last);
        debug!("trim_before removed {removed} vertices");
        removed
    }

    /// Drop every vertex strictly after `vertex`, making it the new tail.
    /// Returns the number of vertices removed.
    pub fn trim_after(&mut self, vertex: VertexId) -> usize {
        let Some(key) = self.key(vertex) else {
            return 0;
        };
        let (Some(first), Some(last)) = (self.vertices[key].next, self.last_vertex) else {
            return 0;
        };
        let removed = self.remove_span(first, last);
        debug!("trim_after removed {removed} vertices");
        removed
    }

    /// Keep only `start..=end`. A missing bound leaves that side untouched.
    pub fn trim_to(&mut self, start: Option<VertexId>, end: Option<VertexId>) -> usize {
        let before = start.map_or(0, |s| self.trim_before(s));
        let after = end.map_or(0, |e| self.trim_after(e));
        before + after
    }

    /// Remove every listed vertex that is in the chain, bridging each gap with
    /// a single new segment. Returns the number of vertices removed.
    pub fn remove_at_any(&mut self, vertices: &[VertexId]) -> usize {
        let mut removed = 0;
        for &id in vertices {
            if let Some(key) = self.key(id) {
                removed += self.remove_span(key, key);
            }
        }
        if removed > 0 {
            debug!("remove_at_any removed {removed} of {} requested vertices", vertices.len());
        }
        removed
    }

    /// Replace everything strictly between `start` and `end` with `new_vertices`.
    ///
    /// A `None` bound extends the replaced range to that end of the chain, but
    /// at least one bound must be given. Returns inserted plus removed counts;
    /// 0 when a bound is not in the chain, when `end` does not follow `start`,
    /// or when the chain is empty.
    pub fn replace_between(
        &mut self,
        start: Option<VertexId>,
        end: Option<VertexId>,
        new_vertices: Vec<Vertex>,
    ) -> usize {
        if self.is_empty() || (start.is_none() && end.is_none()) {
            return 0;
        }
        let Some(start) = self.resolve_bound(start) else {
            return 0;
        };
        let Some(end) = self.resolve_bound(end) else {
            return 0;
        };
        if let (Some(s), Some(e)) = (start, end) {
            if !self.key_precedes(s, e) {
                return 0;
            }
        }

        let first = match start {
            Some(s) => self.vertices[s].next,
            None => self.first_vertex,
        };
        let last = match end {
            Some(e) => self.vertices[e].prev,
            None => self.last_vertex,
        };

        let mut removed = 0;
        if let (Some(first), Some(last)) = (first, last) {
            if Some(first) != end && Some(last) != start {
                removed = self.remove_span(first, last);
            }
        }

        let mut anchor = start;
        let mut inserted = 0;
        for vertex in new_vertices {
            anchor = Some(self.insert_node_after(anchor, vertex));
            inserted += 1;
        }

        debug!("replace_between removed {removed} and inserted {inserted} vertices");
        inserted + removed
    }

    /// `Some(None)` for an open bound, `None` for a bound not in this chain.
    fn resolve_bound(&self, bound: Option<VertexId>) -> Option<Option<VertexKey>> {
        match bound {
            Some(id) => self.key(id).map(Some),
            None => Some(None),
        }
    }

    /// Clone `start..=end` into a new, independent chain. Copies to the tail
    /// when `end` is `None` or does not follow `start`. Returns `None` if
    /// `start` is not in this chain.
    pub fn copy_range_by_points(&self, start: VertexId, end: Option<VertexId>) -> Option<DualChain> {
        let start = self.key(start)?;
        let end = end
            .and_then(|e| self.key(e))
            .filter(|&e| e == start || self.key_precedes(start, e));

        let mut copied = Vec::new();
        let mut cursor = Some(start);
        while let Some(key) = cursor {
            copied.push(self.vertices[key].value.clone());
            if Some(key) == end {
                break;
            }
            cursor = self.vertices[key].next;
        }
        Some(DualChain::from_vertices(copied))
    }
}
