//! 查询编排引擎

pub mod context;
pub mod pipeline;
pub mod task;

#[cfg(test)]
pub(crate) mod fakes;

pub use context::RuntimeContext;
pub use pipeline::BatchEngine;
