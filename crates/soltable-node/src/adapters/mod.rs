//! Port implementations owned by the node.

pub mod storage;
