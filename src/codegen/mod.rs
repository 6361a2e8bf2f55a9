//! Register allocation passes, in pipeline order: [`validate`], [`phi`],
//! [`liveness`], [`color`] and [`spill`], driven by [`reg_alloc`].

pub mod color;
pub mod flow;
pub mod graph;
pub mod liveness;
pub mod phi;
pub mod reg_alloc;
pub mod spill;
pub mod union_find;
pub mod validate;
