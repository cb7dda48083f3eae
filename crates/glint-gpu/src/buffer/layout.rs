//! Interleaved vertex layouts.
//!
//! A [`VertexLayout`] is an ordered `slot → StrideHint` map describing how one
//! stride-sized record of a buffer splits into attributes. With no hints the
//! buffer is "unstructured": tightly packed elements, stride = element size.

use std::collections::BTreeMap;
use std::ops::Range;

use thiserror::Error;

/// One attribute inside an interleaved record.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct StrideHint {
    /// Vertex attribute slot (shader `location`).
    pub slot: u32,
    /// Values per vertex, 1..=4.
    pub components: u32,
    /// Byte offset inside the record.
    pub offset: usize,
    /// Step once per instance instead of once per vertex.
    pub instanced: bool,
}

impl StrideHint {
    #[inline]
    pub const fn per_vertex(slot: u32, components: u32, offset: usize) -> Self {
        Self { slot, components, offset, instanced: false }
    }

    #[inline]
    pub const fn per_instance(slot: u32, components: u32, offset: usize) -> Self {
        Self { slot, components, offset, instanced: true }
    }

    #[inline]
    pub const fn byte_len(&self, element_size: usize) -> usize {
        self.components as usize * element_size
    }

    #[inline]
    pub fn byte_range(&self, element_size: usize) -> Range<usize> {
        self.offset..self.offset + self.byte_len(element_size)
    }
}

/// A layout inconsistency found by [`VertexLayout::check`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LayoutIssue {
    #[error("attributes in slots {a} and {b} overlap")]
    Overlap { a: u32, b: u32 },

    #[error("attribute in slot {slot} ends at byte {end}, past the {stride}-byte stride")]
    PastStride { slot: u32, end: usize, stride: usize },

    #[error("payload of {bytes} bytes is not a whole number of {stride}-byte records")]
    Remainder { bytes: usize, stride: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    hints: BTreeMap<u32, StrideHint>,
}

impl VertexLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a packed layout: each `(slot, components)` follows the previous one.
    ///
    /// ```
    /// use glint_gpu::buffer::VertexLayout;
    ///
    /// // position, normal, one scalar
    /// let layout = VertexLayout::packed(&[(0, 3), (1, 3), (2, 1)], 4);
    /// assert_eq!(layout.stride(4), 28);
    /// ```
    pub fn packed(attributes: &[(u32, u32)], element_size: usize) -> Self {
        let mut layout = Self::new();
        let mut offset = 0;
        for &(slot, components) in attributes {
            layout.insert(StrideHint::per_vertex(slot, components, offset));
            offset += components as usize * element_size;
        }
        layout
    }

    /// Adds or replaces the hint for `hint.slot`; returns the replaced one.
    pub fn insert(&mut self, hint: StrideHint) -> Option<StrideHint> {
        self.hints.insert(hint.slot, hint)
    }

    pub fn remove(&mut self, slot: u32) -> Option<StrideHint> {
        self.hints.remove(&slot)
    }

    pub fn get(&self, slot: u32) -> Option<&StrideHint> {
        self.hints.get(&slot)
    }

    /// Hints in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &StrideHint> {
        self.hints.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.hints.len()
    }

    /// `true` for an unstructured (tightly packed) buffer.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hints.is_empty()
    }

    /// `true` if any hint steps per vertex, or the layout is unstructured.
    pub fn has_per_vertex(&self) -> bool {
        self.is_empty() || self.hints.values().any(|h| !h.instanced)
    }

    /// Record size in bytes: the sum of every hint's `components × element_size`,
    /// or `element_size` when unstructured.
    pub fn stride(&self, element_size: usize) -> usize {
        if self.hints.is_empty() {
            element_size
        } else {
            self.hints.values().map(|h| h.byte_len(element_size)).sum()
        }
    }

    /// Whole records in a payload of `bytes` bytes.
    pub fn record_count(&self, bytes: usize, element_size: usize) -> u32 {
        match self.stride(element_size) {
            0 => 0,
            stride => (bytes / stride) as u32,
        }
    }

    /// Lists overlaps, attributes running past the stride, and a payload that
    /// is not a whole number of records.
    pub fn check(&self, element_size: usize, payload_bytes: usize) -> Vec<LayoutIssue> {
        let mut issues = Vec::new();
        let stride = self.stride(element_size);

        let hints: Vec<_> = self.hints.values().collect();
        for (i, a) in hints.iter().enumerate() {
            let ra = a.byte_range(element_size);
            if ra.end > stride {
                issues.push(LayoutIssue::PastStride { slot: a.slot, end: ra.end, stride });
            }
            for b in &hints[i + 1..] {
                let rb = b.byte_range(element_size);
                if ra.start < rb.end && rb.start < ra.end {
                    issues.push(LayoutIssue::Overlap { a: a.slot, b: b.slot });
                }
            }
        }

        if stride > 0 && payload_bytes % stride != 0 {
            issues.push(LayoutIssue::Remainder { bytes: payload_bytes, stride });
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_is_sum_of_hints() {
        let mut layout = VertexLayout::packed(&[(0, 3), (1, 3), (2, 1)], 4);
        assert_eq!(layout.stride(4), 28);
        assert_eq!(layout.record_count(2800, 4), 100);

        layout.remove(1);
        assert_eq!(layout.stride(4), 16);
        layout.remove(0);
        layout.remove(2);
        assert_eq!(layout.stride(4), 4);
        assert_eq!(layout.record_count(2800, 4), 700);
    }

    #[test]
    fn insert_replaces_same_slot() {
        let mut layout = VertexLayout::new();
        layout.insert(StrideHint::per_vertex(0, 2, 0));
        let old = layout.insert(StrideHint::per_vertex(0, 4, 0));
        assert_eq!(old.map(|h| h.components), Some(2));
        assert_eq!(layout.stride(4), 16);
    }

    #[test]
    fn overlap_is_reported() {
        let mut layout = VertexLayout::new();
        layout.insert(StrideHint::per_vertex(0, 3, 0));
        layout.insert(StrideHint::per_vertex(1, 2, 8));
        let issues = layout.check(4, 200);
        assert!(issues.contains(&LayoutIssue::Overlap { a: 0, b: 1 }));
    }

    #[test]
    fn remainder_is_reported() {
        let layout = VertexLayout::packed(&[(0, 3)], 4);
        assert!(layout.check(4, 24).is_empty());
        assert_eq!(layout.check(4, 26), vec![LayoutIssue::Remainder { bytes: 26, stride: 12 }]);
    }

    #[test]
    fn gap_pushes_attribute_past_stride() {
        let mut layout = VertexLayout::new();
        layout.insert(StrideHint::per_vertex(0, 2, 4));
        assert_eq!(layout.check(4, 0), vec![LayoutIssue::PastStride { slot: 0, end: 12, stride: 8 }]);
    }

    #[test]
    fn instanced_only_layout_has_no_per_vertex() {
        let mut layout = VertexLayout::new();
        assert!(layout.has_per_vertex());
        layout.insert(StrideHint::per_instance(4, 4, 0));
        assert!(!layout.has_per_vertex());
    }
}
