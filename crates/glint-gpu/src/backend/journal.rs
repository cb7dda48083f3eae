//! Call journal shared between a [`HeadlessBackend`](super::HeadlessBackend)
//! and whoever wants to observe it.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::backend::{IndexType, Primitive};
use crate::handle::Handle;

/// A draw call as the backend received it.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DrawRecord {
    pub primitive: Primitive,
    pub first: u32,
    pub count: u32,
    pub instances: u32,
    /// `Some` for indexed draws.
    pub index_type: Option<IndexType>,
    pub program: Handle,
    pub framebuffer: Handle,
}

/// Uniform payload as received by one of the primitive upload calls.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformData {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    U32(Vec<u32>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniformWrite {
    pub program: Handle,
    pub location: i32,
    pub components: u32,
    pub transpose: bool,
    pub data: UniformData,
}

#[derive(Debug, Default)]
struct JournalInner {
    calls: Vec<&'static str>,
    counts: FxHashMap<&'static str, usize>,
    draws: Vec<DrawRecord>,
    uniform_writes: Vec<UniformWrite>,
}

/// Append-only record of backend calls.
///
/// Cloning yields another view of the same journal.
#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<JournalInner>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, call: &'static str) {
        let mut inner = self.0.borrow_mut();
        inner.calls.push(call);
        *inner.counts.entry(call).or_insert(0) += 1;
    }

    pub(crate) fn record_draw(&self, draw: DrawRecord) {
        self.0.borrow_mut().draws.push(draw);
    }

    pub(crate) fn record_uniform(&self, write: UniformWrite) {
        self.0.borrow_mut().uniform_writes.push(write);
    }

    /// Number of times `call` was issued since the last [`clear`](Self::clear).
    pub fn count(&self, call: &str) -> usize {
        self.0.borrow().counts.get(call).copied().unwrap_or(0)
    }

    /// Total number of calls recorded.
    pub fn len(&self) -> usize {
        self.0.borrow().calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call names in issue order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.0.borrow().calls.clone()
    }

    pub fn draws(&self) -> Vec<DrawRecord> {
        self.0.borrow().draws.clone()
    }

    pub fn last_draw(&self) -> Option<DrawRecord> {
        self.0.borrow().draws.last().copied()
    }

    pub fn uniform_writes(&self) -> Vec<UniformWrite> {
        self.0.borrow().uniform_writes.clone()
    }

    pub fn last_uniform_write(&self) -> Option<UniformWrite> {
        self.0.borrow().uniform_writes.last().cloned()
    }

    pub fn clear(&self) {
        let mut inner = self.0.borrow_mut();
        inner.calls.clear();
        inner.counts.clear();
        inner.draws.clear();
        inner.uniform_writes.clear();
    }
}
