//! Pluggable render backend contract
//!
//! The command buffer dispatches every command to one of the methods below.
//! Each method has a default body that reports the method as unsupported, so
//! a backend missing an entry point surfaces a configuration error at
//! execution time instead of silently dropping work.

use std::fmt;

use crate::command::{ClearFlags, Primitive, RenderState, UniformValue};

/// Error type for backend execution
#[derive(Debug)]
pub enum BackendError {
    /// The backend does not implement this command's entry point
    Unsupported(&'static str),
    /// The backend failed while executing a command
    Failed(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Unsupported(method) => {
                write!(f, "Backend does not implement '{}'", method)
            }
            BackendError::Failed(msg) => write!(f, "Backend execution failed: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// The operations a backend must provide to execute a command buffer
///
/// Implementations perform the actual drawing side effects; the core never
/// touches a GPU API itself.
#[allow(unused_variables)]
pub trait RenderBackend {
    fn clear(
        &mut self,
        flags: ClearFlags,
        color: [f32; 4],
        depth: f32,
        stencil: u32,
    ) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("clear"))
    }

    fn set_state(&mut self, state: &RenderState) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("set_state"))
    }

    fn bind_shader(&mut self, shader: &str) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("bind_shader"))
    }

    fn bind_texture(&mut self, slot: u32, texture: &str) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("bind_texture"))
    }

    fn bind_vertex_array(&mut self, source: &str) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("bind_vertex_array"))
    }

    fn bind_render_target(&mut self, target: Option<&str>) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("bind_render_target"))
    }

    fn set_uniform(&mut self, name: &str, value: &UniformValue) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("set_uniform"))
    }

    fn draw(
        &mut self,
        topology: Primitive,
        vertex_count: u32,
        first_vertex: u32,
    ) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("draw"))
    }

    fn draw_indexed(
        &mut self,
        topology: Primitive,
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
    ) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("draw_indexed"))
    }

    fn draw_instanced(
        &mut self,
        topology: Primitive,
        vertex_count: u32,
        first_vertex: u32,
        instance_count: u32,
    ) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("draw_instanced"))
    }

    fn draw_indexed_instanced(
        &mut self,
        topology: Primitive,
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
        instance_count: u32,
    ) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("draw_indexed_instanced"))
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("set_viewport"))
    }
}

/// A headless backend that records every call it receives.
///
/// Used by the demo binary and by tests asserting execution order; each op
/// is also emitted at debug log level.
#[derive(Default)]
pub struct TraceBackend {
    ops: Vec<String>,
}

impl TraceBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation received so far, in execution order
    pub fn ops(&self) -> &[String] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn record(&mut self, op: String) -> Result<(), BackendError> {
        log::debug!("TraceBackend: {}", op);
        self.ops.push(op);
        Ok(())
    }
}

impl RenderBackend for TraceBackend {
    fn clear(
        &mut self,
        flags: ClearFlags,
        color: [f32; 4],
        _depth: f32,
        _stencil: u32,
    ) -> Result<(), BackendError> {
        self.record(format!("clear({:?}, {:?})", flags, color))
    }

    fn set_state(&mut self, state: &RenderState) -> Result<(), BackendError> {
        self.record(format!("set_state({:?})", state))
    }

    fn bind_shader(&mut self, shader: &str) -> Result<(), BackendError> {
        self.record(format!("bind_shader({})", shader))
    }

    fn bind_texture(&mut self, slot: u32, texture: &str) -> Result<(), BackendError> {
        self.record(format!("bind_texture({}, {})", slot, texture))
    }

    fn bind_vertex_array(&mut self, source: &str) -> Result<(), BackendError> {
        self.record(format!("bind_vertex_array({})", source))
    }

    fn bind_render_target(&mut self, target: Option<&str>) -> Result<(), BackendError> {
        self.record(format!("bind_render_target({})", target.unwrap_or("default")))
    }

    fn set_uniform(&mut self, name: &str, value: &UniformValue) -> Result<(), BackendError> {
        self.record(format!("set_uniform({}, {:?})", name, value))
    }

    fn draw(
        &mut self,
        topology: Primitive,
        vertex_count: u32,
        first_vertex: u32,
    ) -> Result<(), BackendError> {
        self.record(format!("draw({:?}, {}, {})", topology, vertex_count, first_vertex))
    }

    fn draw_indexed(
        &mut self,
        topology: Primitive,
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
    ) -> Result<(), BackendError> {
        self.record(format!(
            "draw_indexed({:?}, {}, {}, {})",
            topology, index_count, first_index, base_vertex
        ))
    }

    fn draw_instanced(
        &mut self,
        topology: Primitive,
        vertex_count: u32,
        first_vertex: u32,
        instance_count: u32,
    ) -> Result<(), BackendError> {
        self.record(format!(
            "draw_instanced({:?}, {}, {}, {})",
            topology, vertex_count, first_vertex, instance_count
        ))
    }

    fn draw_indexed_instanced(
        &mut self,
        topology: Primitive,
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
        instance_count: u32,
    ) -> Result<(), BackendError> {
        self.record(format!(
            "draw_indexed_instanced({:?}, {}, {}, {}, {})",
            topology, index_count, first_index, base_vertex, instance_count
        ))
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) -> Result<(), BackendError> {
        self.record(format!("set_viewport({}, {}, {}, {})", x, y, width, height))
    }
}
