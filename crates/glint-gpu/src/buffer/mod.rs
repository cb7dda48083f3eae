//! Buffer objects: vertex buffers with stride-described layouts, element
//! buffers, and the vertex arrays that group them.

mod array;
mod element;
mod layout;
mod vertex;

pub use array::VertexArray;
pub use element::{ElementBuffer, IndexElement};
pub use layout::{LayoutIssue, StrideHint, VertexLayout};
pub use vertex::VertexBuffer;
