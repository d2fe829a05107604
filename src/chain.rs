//! The dual chain: a doubly linked chain of vertices and, interleaved with it,
//! a doubly linked chain of the segments between consecutive vertices.
//!
//! Nodes live in generational arenas and link to each other by key, so a
//! removed node's key never resolves again, even after its slot is reused.
//! Ids handed out to callers also carry the tag of the issuing chain, so an id
//! from one chain never resolves in another, copies and clones included.

use std::sync::atomic::{AtomicU32, Ordering};

use slotmap::SlotMap;

use crate::error::PolylineError;
use crate::segment::Segment;
use crate::vertex::Vertex;

slotmap::new_key_type! {
    pub(crate) struct VertexKey;
    pub(crate) struct SegmentKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct ChainTag(u32);

impl ChainTag {
    fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identity of a vertex node. Only resolves in the chain that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId {
    chain: ChainTag,
    key: VertexKey,
}

/// Identity of a segment node. Segment ids change whenever segments are rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId {
    chain: ChainTag,
    key: SegmentKey,
}

#[derive(Debug, Clone)]
pub(crate) struct VertexNode {
    pub(crate) value: Vertex,
    pub(crate) prev: Option<VertexKey>,
    pub(crate) next: Option<VertexKey>,
    /// Segment ending at this vertex.
    pub(crate) prev_segment: Option<SegmentKey>,
    /// Segment starting at this vertex.
    pub(crate) next_segment: Option<SegmentKey>,
}

#[derive(Debug, Clone)]
pub(crate) struct SegmentNode {
    pub(crate) value: Segment,
    pub(crate) prev: Option<SegmentKey>,
    pub(crate) next: Option<SegmentKey>,
    pub(crate) from: VertexKey,
    pub(crate) to: VertexKey,
}

/// An ordered polyline with derived segments.
///
/// A chain of `n` vertices always holds `max(n - 1, 0)` segments, segment `k`
/// spanning vertex `k` to vertex `k + 1`. Only one mutation may run at a time;
/// every `&mut self` method leaves the chain consistent before returning.
#[derive(Debug)]
pub struct DualChain {
    tag: ChainTag,
    pub(crate) vertices: SlotMap<VertexKey, VertexNode>,
    pub(crate) segments: SlotMap<SegmentKey, SegmentNode>,
    pub(crate) first_vertex: Option<VertexKey>,
    pub(crate) last_vertex: Option<VertexKey>,
    pub(crate) first_segment: Option<SegmentKey>,
    pub(crate) last_segment: Option<SegmentKey>,
}

impl Default for DualChain {
    fn default() -> Self {
        Self {
            tag: ChainTag::next(),
            vertices: SlotMap::with_key(),
            segments: SlotMap::with_key(),
            first_vertex: None,
            last_vertex: None,
            first_segment: None,
            last_segment: None,
        }
    }
}

/// A clone is a separate chain: ids of the original do not resolve in it.
impl Clone for DualChain {
    fn clone(&self) -> Self {
        Self {
            tag: ChainTag::next(),
            vertices: self.vertices.clone(),
            segments: self.segments.clone(),
            first_vertex: self.first_vertex,
            last_vertex: self.last_vertex,
            first_segment: self.first_segment,
            last_segment: self.last_segment,
        }
    }
}

impl DualChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a chain from vertices in order and derive all properties.
    pub fn from_vertices<I>(vertices: I) -> Self
    where
        I: IntoIterator<Item = Vertex>,
    {
        let mut chain = Self::new();
        for value in vertices {
            let key = chain.vertices.insert(VertexNode {
                value,
                prev: chain.last_vertex,
                next: None,
                prev_segment: None,
                next_segment: None,
            });
            match chain.last_vertex {
                Some(last) => chain.vertices[last].next = Some(key),
                None => chain.first_vertex = Some(key),
            }
            chain.last_vertex = Some(key);
        }
        chain.rebuild_segments();
        chain
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Resolve an id to this chain's arena key, if it was issued here and is
    /// still attached.
    pub(crate) fn key(&self, id: VertexId) -> Option<VertexKey> {
        (id.chain == self.tag && self.vertices.contains_key(id.key)).then_some(id.key)
    }

    fn segment_key(&self, id: SegmentId) -> Option<SegmentKey> {
        (id.chain == self.tag && self.segments.contains_key(id.key)).then_some(id.key)
    }

    pub(crate) fn vertex_id(&self, key: VertexKey) -> VertexId {
        VertexId {
            chain: self.tag,
            key,
        }
    }

    fn segment_id(&self, key: SegmentKey) -> SegmentId {
        SegmentId {
            chain: self.tag,
            key,
        }
    }

    pub(crate) fn vertex_keys(&self) -> impl Iterator<Item = VertexKey> + Clone + '_ {
        std::iter::successors(self.first_vertex, move |key| self.vertices[*key].next)
    }

    pub(crate) fn segment_keys(&self) -> impl Iterator<Item = SegmentKey> + Clone + '_ {
        std::iter::successors(self.first_segment, move |key| self.segments[*key].next)
    }

    /// Vertex ids head to tail.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + Clone + '_ {
        self.vertex_keys().map(move |key| self.vertex_id(key))
    }

    /// Segment ids head to tail.
    pub fn segment_ids(&self) -> impl Iterator<Item = SegmentId> + Clone + '_ {
        self.segment_keys().map(move |key| self.segment_id(key))
    }

    /// Vertex values head to tail. The iterator can be cloned to restart.
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> + Clone + '_ {
        self.vertex_keys().map(move |key| &self.vertices[key].value)
    }

    /// Segment values head to tail.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> + Clone + '_ {
        self.segment_keys().map(move |key| &self.segments[key].value)
    }

    pub fn first_vertex_id(&self) -> Option<VertexId> {
        self.first_vertex.map(|key| self.vertex_id(key))
    }

    pub fn last_vertex_id(&self) -> Option<VertexId> {
        self.last_vertex.map(|key| self.vertex_id(key))
    }

    pub fn first_vertex(&self) -> Option<&Vertex> {
        self.first_vertex.map(|key| &self.vertices[key].value)
    }

    pub fn last_vertex(&self) -> Option<&Vertex> {
        self.last_vertex.map(|key| &self.vertices[key].value)
    }

    pub fn first_segment(&self) -> Option<&Segment> {
        self.first_segment.map(|key| &self.segments[key].value)
    }

    pub fn last_segment(&self) -> Option<&Segment> {
        self.last_segment.map(|key| &self.segments[key].value)
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.key(id).is_some()
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.key(id).map(|key| &self.vertices[key].value)
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segment_key(id).map(|key| &self.segments[key].value)
    }

    pub fn next_vertex(&self, id: VertexId) -> Option<VertexId> {
        let next = self.vertices[self.key(id)?].next?;
        Some(self.vertex_id(next))
    }

    pub fn prev_vertex(&self, id: VertexId) -> Option<VertexId> {
        let prev = self.vertices[self.key(id)?].prev?;
        Some(self.vertex_id(prev))
    }

    /// The segment ending at `id`.
    pub fn incoming_segment(&self, id: VertexId) -> Option<SegmentId> {
        let segment = self.vertices[self.key(id)?].prev_segment?;
        Some(self.segment_id(segment))
    }

    /// The segment starting at `id`.
    pub fn outgoing_segment(&self, id: VertexId) -> Option<SegmentId> {
        let segment = self.vertices[self.key(id)?].next_segment?;
        Some(self.segment_id(segment))
    }

    /// `(from, to)` vertices bridged by a segment.
    pub fn segment_endpoints(&self, id: SegmentId) -> Option<(VertexId, VertexId)> {
        let node = &self.segments[self.segment_key(id)?];
        Some((self.vertex_id(node.from), self.vertex_id(node.to)))
    }

    /// Zero-based position of a vertex, walking from the head.
    pub fn position_of(&self, id: VertexId) -> Option<usize> {
        let key = self.key(id)?;
        self.vertex_keys().position(|candidate| candidate == key)
    }

    pub fn vertex_id_at(&self, index: usize) -> Option<VertexId> {
        self.vertex_ids().nth(index)
    }

    /// True if `later` can be reached by walking forward from `earlier`.
    pub fn precedes(&self, earlier: VertexId, later: VertexId) -> bool {
        match (self.key(earlier), self.key(later)) {
            (Some(earlier), Some(later)) => self.key_precedes(earlier, later),
            _ => false,
        }
    }

    pub(crate) fn key_precedes(&self, earlier: VertexKey, later: VertexKey) -> bool {
        std::iter::successors(self.vertices[earlier].next, |key| self.vertices[*key].next)
            .any(|key| key == later)
    }

    /// Total length in metres.
    pub fn length(&self) -> f64 {
        self.segments().map(|s| s.length).sum()
    }

    /// Throw away every segment and derive a fresh one per consecutive vertex
    /// pair, then recompute vertex path properties. Idempotent.
    pub fn rebuild_segments(&mut self) {
        self.segments.clear();
        self.first_segment = None;
        self.last_segment = None;
        for node in self.vertices.values_mut() {
            node.prev_segment = None;
            node.next_segment = None;
        }

        let keys: Vec<VertexKey> = self.vertex_keys().collect();
        for pair in keys.windows(2) {
            self.attach_segment(pair[0], pair[1]);
        }
        self.update_path_properties();
    }

    /// Create the segment between two adjacent vertices and thread it into the
    /// segment chain. Path properties are left alone.
    ///
    /// A neighbouring segment that is not linked yet (its vertices exist but
    /// the segment is attached later) is picked up when that segment attaches.
    fn attach_segment(&mut self, from: VertexKey, to: VertexKey) -> SegmentKey {
        let prev = self.vertices[from].prev_segment;
        let next = self.vertices[to].next_segment;
        let value = Segment::between(&self.vertices[from].value, &self.vertices[to].value);

        let key = self.segments.insert(SegmentNode {
            value,
            prev,
            next,
            from,
            to,
        });
        match prev {
            Some(p) => self.segments[p].next = Some(key),
            None if self.vertices[from].prev.is_none() => self.first_segment = Some(key),
            None => {}
        }
        match next {
            Some(n) => self.segments[n].prev = Some(key),
            None if self.vertices[to].next.is_none() => self.last_segment = Some(key),
            None => {}
        }
        self.vertices[from].next_segment = Some(key);
        self.vertices[to].prev_segment = Some(key);
        key
    }

    /// Attach a segment and refresh both endpoints.
    pub(crate) fn link_segment(&mut self, from: VertexKey, to: VertexKey) -> SegmentKey {
        let key = self.attach_segment(from, to);
        self.refresh_path(from);
        self.refresh_path(to);
        key
    }

    /// Remove a segment from the segment chain and clear the endpoint references.
    pub(crate) fn unlink_segment(&mut self, key: SegmentKey) {
        let Some(node) = self.segments.remove(key) else {
            return;
        };
        match node.prev {
            Some(p) => self.segments[p].next = node.next,
            None => self.first_segment = node.next,
        }
        match node.next {
            Some(n) => self.segments[n].prev = node.prev,
            None => self.last_segment = node.prev,
        }
        if let Some(from) = self.vertices.get_mut(node.from) {
            from.next_segment = None;
        }
        if let Some(to) = self.vertices.get_mut(node.to) {
            to.prev_segment = None;
        }
    }

    /// Append a vertex at the tail, patching in the one new segment.
    pub fn push_vertex(&mut self, vertex: Vertex) -> VertexId {
        let anchor = self.last_vertex;
        let key = self.insert_node_after(anchor, vertex);
        self.vertex_id(key)
    }

    /// Insert a vertex right after `anchor`, or at the head for `None`.
    /// Returns `None` if `anchor` is not in this chain.
    pub fn insert_after(&mut self, anchor: Option<VertexId>, vertex: Vertex) -> Option<VertexId> {
        let anchor = match anchor {
            Some(id) => Some(self.key(id)?),
            None => None,
        };
        let key = self.insert_node_after(anchor, vertex);
        Some(self.vertex_id(key))
    }

    pub(crate) fn insert_node_after(&mut self, anchor: Option<VertexKey>, vertex: Vertex) -> VertexKey {
        let next = match anchor {
            Some(a) => self.vertices[a].next,
            None => self.first_vertex,
        };
        if let Some(spanning) = anchor.and_then(|a| self.vertices[a].next_segment) {
            self.unlink_segment(spanning);
        }

        let key = self.vertices.insert(VertexNode {
            value: vertex,
            prev: anchor,
            next,
            prev_segment: None,
            next_segment: None,
        });
        match anchor {
            Some(a) => self.vertices[a].next = Some(key),
            None => self.first_vertex = Some(key),
        }
        match next {
            Some(n) => self.vertices[n].prev = Some(key),
            None => self.last_vertex = Some(key),
        }

        if let Some(a) = anchor {
            self.link_segment(a, key);
        }
        if let Some(n) = next {
            self.link_segment(key, n);
        }
        if anchor.is_none() && next.is_none() {
            self.refresh_path(key);
        }
        key
    }

    /// Detach the contiguous run `first..=last` together with every segment
    /// touching it, then close the gap with one bridging segment if vertices
    /// remain on both sides. `first` must not come after `last`.
    pub(crate) fn remove_span(&mut self, first: VertexKey, last: VertexKey) -> usize {
        let mut run = Vec::new();
        let mut cursor = Some(first);
        while let Some(key) = cursor {
            run.push(key);
            if key == last {
                break;
            }
            cursor = self.vertices[key].next;
        }

        let before = self.vertices[first].prev;
        let after = self.vertices[last].next;

        for &key in &run {
            let node = &self.vertices[key];
            let incident = [node.prev_segment, node.next_segment];
            for segment in incident.into_iter().flatten() {
                self.unlink_segment(segment);
            }
        }
        for &key in &run {
            self.vertices.remove(key);
        }

        match before {
            Some(b) => self.vertices[b].next = after,
            None => self.first_vertex = after,
        }
        match after {
            Some(a) => self.vertices[a].prev = before,
            None => self.last_vertex = before,
        }

        match (before, after) {
            (Some(b), Some(a)) => {
                self.link_segment(b, a);
            }
            (Some(end), None) | (None, Some(end)) => self.refresh_path(end),
            (None, None) => {}
        }
        run.len()
    }

    /// Verify the structural invariants, describing the first violation found.
    pub fn check_invariants(&self) -> Result<(), PolylineError> {
        let broken = |msg: String| Err(PolylineError::BrokenChain(msg));

        let expected_segments = self.vertex_count().saturating_sub(1);
        if self.segment_count() != expected_segments {
            return broken(format!(
                "{} vertices but {} segments",
                self.vertex_count(),
                self.segment_count()
            ));
        }

        let keys: Vec<VertexKey> = self.vertex_keys().collect();
        if keys.len() != self.vertex_count() {
            return broken(format!(
                "vertex chain reaches {} of {} vertices",
                keys.len(),
                self.vertex_count()
            ));
        }
        if keys.last().copied() != self.last_vertex {
            return broken("vertex tail does not end the chain".to_string());
        }

        let segment_keys: Vec<SegmentKey> = self.segment_keys().collect();
        if segment_keys.len() != self.segment_count() {
            return broken("segment chain does not reach every segment".to_string());
        }
        if segment_keys.last().copied() != self.last_segment {
            return broken("segment tail does not end the chain".to_string());
        }

        for (index, &key) in keys.iter().enumerate() {
            let node = &self.vertices[key];
            let expected_prev = index.checked_sub(1).map(|i| keys[i]);
            if node.prev != expected_prev {
                return broken(format!("vertex {index} has a stale predecessor link"));
            }
            let expected_in = index.checked_sub(1).map(|i| segment_keys[i]);
            let expected_out = segment_keys.get(index).copied();
            if node.prev_segment != expected_in || node.next_segment != expected_out {
                return broken(format!("vertex {index} is cross-linked to the wrong segment"));
            }
        }

        for (index, &key) in segment_keys.iter().enumerate() {
            let node = &self.segments[key];
            if node.from != keys[index] || node.to != keys[index + 1] {
                return broken(format!(
                    "segment {index} does not bridge vertices {index} and {}",
                    index + 1
                ));
            }
            let expected_prev = index.checked_sub(1).map(|i| segment_keys[i]);
            if node.prev != expected_prev {
                return broken(format!("segment {index} has a stale predecessor link"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn line(n: usize) -> Vec<Vertex> {
        (0..n)
            .map(|i| Vertex::new(35.0 + i as f64 * 0.001, 139.0 + (i % 2) as f64 * 0.001))
            .collect()
    }

    #[test]
    fn test_empty_chain() {
        let chain = DualChain::new();
        assert_eq!(chain.vertex_count(), 0);
        assert_eq!(chain.segment_count(), 0);
        assert!(chain.first_vertex().is_none());
        assert!(chain.last_segment().is_none());
        assert_eq!(chain.vertices().count(), 0);
        chain.check_invariants().unwrap();
    }

    #[test]
    fn test_single_vertex_has_no_segment() {
        let chain = DualChain::from_vertices(line(1));
        assert_eq!(chain.vertex_count(), 1);
        assert_eq!(chain.segment_count(), 0);
        assert_eq!(chain.first_vertex_id(), chain.last_vertex_id());
        chain.check_invariants().unwrap();
    }

    #[test]
    fn test_from_vertices_links_segments() {
        let chain = DualChain::from_vertices(line(5));
        assert_eq!(chain.vertex_count(), 5);
        assert_eq!(chain.segment_count(), 4);
        chain.check_invariants().unwrap();

        let head = chain.first_vertex_id().unwrap();
        assert_eq!(chain.incoming_segment(head), None);
        let tail = chain.last_vertex_id().unwrap();
        assert_eq!(chain.outgoing_segment(tail), None);

        let second = chain.next_vertex(head).unwrap();
        let out = chain.outgoing_segment(head).unwrap();
        assert_eq!(chain.segment_endpoints(out), Some((head, second)));
        assert_eq!(chain.incoming_segment(second), Some(out));
    }

    #[test]
    fn test_vertices_iterator_restarts() {
        let chain = DualChain::from_vertices(line(3));
        let iter = chain.vertices();
        let first_pass: Vec<_> = iter.clone().collect();
        let second_pass: Vec<_> = iter.collect();
        assert_eq!(first_pass, second_pass);
        assert_eq!(first_pass.len(), 3);
    }

    #[test]
    fn test_rebuild_segments_idempotent() {
        let mut chain = DualChain::from_vertices(line(6));
        chain.rebuild_segments();
        let once: Vec<Segment> = chain.segments().cloned().collect();
        chain.rebuild_segments();
        let twice: Vec<Segment> = chain.segments().cloned().collect();
        assert_eq!(once, twice);
        chain.check_invariants().unwrap();
    }

    #[test]
    fn test_push_vertex_patches_tail() {
        let mut chain = DualChain::new();
        let a = chain.push_vertex(Vertex::new(0.0, 0.0));
        assert_eq!(chain.segment_count(), 0);
        let b = chain.push_vertex(Vertex::new(0.0, 0.001));
        let c = chain.push_vertex(Vertex::new(0.001, 0.001));
        assert_eq!(chain.segment_count(), 2);
        chain.check_invariants().unwrap();

        assert!(chain.precedes(a, c));
        assert!(!chain.precedes(c, a));
        assert_eq!(chain.position_of(b), Some(1));

        let rebuilt = DualChain::from_vertices(chain.vertices().cloned());
        let patched: Vec<&Segment> = chain.segments().collect();
        let fresh: Vec<&Segment> = rebuilt.segments().collect();
        assert_eq!(patched, fresh);
        assert_eq!(
            chain.vertices().collect::<Vec<_>>(),
            rebuilt.vertices().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_insert_after_splits_segment() {
        let mut chain = DualChain::from_vertices(line(3));
        let head = chain.first_vertex_id().unwrap();
        let inserted = chain
            .insert_after(Some(head), Vertex::new(35.0005, 139.0005))
            .unwrap();
        assert_eq!(chain.vertex_count(), 4);
        assert_eq!(chain.position_of(inserted), Some(1));
        chain.check_invariants().unwrap();

        let new_head = chain.insert_after(None, Vertex::new(34.999, 139.0)).unwrap();
        assert_eq!(chain.first_vertex_id(), Some(new_head));
        chain.check_invariants().unwrap();
    }

    #[test]
    fn test_insert_after_foreign_anchor() {
        let other = DualChain::from_vertices(line(3));
        let mut chain = DualChain::from_vertices(line(3));
        let foreign = other.vertex_id_at(1).unwrap();
        assert!(!chain.contains(foreign));
        assert!(chain.vertex(foreign).is_none());
        assert_eq!(chain.position_of(foreign), None);
        assert!(chain.insert_after(Some(foreign), Vertex::new(0.0, 0.0)).is_none());
        assert_eq!(chain.vertex_count(), 3);

        let foreign_segment = other.segment_ids().next().unwrap();
        assert!(chain.segment(foreign_segment).is_none());
        assert_eq!(chain.segment_endpoints(foreign_segment), None);
    }

    #[test]
    fn test_clone_issues_its_own_ids() {
        let chain = DualChain::from_vertices(line(3));
        let clone = chain.clone();
        let original = chain.first_vertex_id().unwrap();
        assert!(!clone.contains(original));
        assert_ne!(clone.first_vertex_id(), Some(original));
        assert_eq!(
            clone.vertices().collect::<Vec<_>>(),
            chain.vertices().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_check_invariants_reports_broken_links() {
        let mut chain = DualChain::from_vertices(line(4));
        let stray = chain.first_segment.unwrap();
        chain.segments.remove(stray);
        assert!(matches!(
            chain.check_invariants(),
            Err(PolylineError::BrokenChain(_))
        ));
    }

    #[test]
    fn test_length_sums_segments() {
        let chain = DualChain::from_vertices(line(4));
        let sum: f64 = chain.segments().map(|s| s.length).sum();
        assert!(chain.length() > 0.0);
        assert_eq!(chain.length(), sum);
    }
}
