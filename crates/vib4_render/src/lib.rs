//! Render command recording and scheduling for the vib4 engine
//!
//! This crate is the backend-agnostic half of rendering: it defines the
//! closed set of [`RenderCommand`]s, the [`CommandBuffer`] that records,
//! sorts, and executes them, and the [`RenderBackend`] trait a concrete
//! GPU layer implements. The [`TraceBackend`] records calls instead of
//! drawing, for tests and headless runs.

mod command;
mod command_buffer;
mod backend;

pub use command::{
    priority, BlendMode, ClearFlags, CommandKind, CullMode, CustomCommand, Primitive,
    RenderCommand, RenderState, UniformValue,
};
pub use command_buffer::{
    BufferStats, CommandBuffer, FrameProfile, SortComparator, SortMode,
};
pub use backend::{BackendError, RenderBackend, TraceBackend};
