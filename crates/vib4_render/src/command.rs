//! Typed render commands
//!
//! A [`RenderCommand`] is an immutable record of one backend operation:
//! clear, state change, bind, uniform upload, draw, viewport, or a custom
//! callback. Commands carry an execution priority (higher runs earlier in
//! the default sort), an optional sort key for tie-breaking, and an optional
//! depth for distance-ordered modes. The only thing mutable after
//! construction is the debug label.

use std::fmt;

use bitflags::bitflags;
use vib4_math::{Mat4, Vec4};

use crate::backend::{BackendError, RenderBackend};

bitflags! {
    /// Which buffers a clear command touches
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ClearFlags: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
        const ALL = Self::COLOR.bits() | Self::DEPTH.bits() | Self::STENCIL.bits();
    }
}

/// Primitive topology of a draw
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Primitive {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
}

/// Blending applied by the fixed-function state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlendMode {
    #[default]
    Opaque,
    Alpha,
    Additive,
}

/// Face culling applied by the fixed-function state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CullMode {
    #[default]
    Back,
    Front,
    None,
}

/// Fixed-function pipeline state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub blend: BlendMode,
    pub cull: CullMode,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            blend: BlendMode::Opaque,
            cull: CullMode::Back,
        }
    }
}

/// A uniform value uploaded by a set-uniform command
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec4(Vec4),
    Mat4(Mat4),
}

/// Custom command callback, executed against the backend
pub type CustomCommand = Box<dyn Fn(&mut dyn RenderBackend) -> Result<(), BackendError>>;

/// The closed set of command payloads
///
/// Resources are referenced by their `ResourceManager` id strings.
pub enum CommandKind {
    Clear {
        flags: ClearFlags,
        color: [f32; 4],
        depth: f32,
        stencil: u32,
    },
    SetState(RenderState),
    BindShader {
        shader: String,
    },
    BindTexture {
        slot: u32,
        texture: String,
    },
    BindVertexSource {
        source: String,
    },
    BindRenderTarget {
        /// `None` binds the default target
        target: Option<String>,
    },
    SetUniform {
        name: String,
        value: UniformValue,
    },
    Draw {
        topology: Primitive,
        vertex_count: u32,
        first_vertex: u32,
    },
    DrawIndexed {
        topology: Primitive,
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
    },
    DrawInstanced {
        topology: Primitive,
        vertex_count: u32,
        first_vertex: u32,
        instance_count: u32,
    },
    DrawIndexedInstanced {
        topology: Primitive,
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
        instance_count: u32,
    },
    SetViewport {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    Custom(CustomCommand),
}

/// Default execution priorities, encoding the usual GPU-pass tiers:
/// clears run before state changes, state changes before binds, binds
/// before draws.
pub mod priority {
    pub const CLEAR: i32 = 1000;
    pub const STATE: i32 = 900;
    pub const BIND: i32 = 800;
    pub const DRAW: i32 = 500;
    pub const CUSTOM: i32 = 100;
}

/// One recorded backend operation
pub struct RenderCommand {
    kind: CommandKind,
    priority: i32,
    sort_key: u64,
    depth: Option<f32>,
    label: Option<String>,
}

impl RenderCommand {
    fn new(kind: CommandKind, priority: i32) -> Self {
        Self {
            kind,
            priority,
            sort_key: 0,
            depth: None,
            label: None,
        }
    }

    /// Clear command
    pub fn clear(flags: ClearFlags, color: [f32; 4]) -> Self {
        Self::new(
            CommandKind::Clear {
                flags,
                color,
                depth: 1.0,
                stencil: 0,
            },
            priority::CLEAR,
        )
    }

    /// Clear command with explicit depth/stencil clear values
    pub fn clear_with(flags: ClearFlags, color: [f32; 4], depth: f32, stencil: u32) -> Self {
        Self::new(
            CommandKind::Clear {
                flags,
                color,
                depth,
                stencil,
            },
            priority::CLEAR,
        )
    }

    /// State-change command
    pub fn set_state(state: RenderState) -> Self {
        Self::new(CommandKind::SetState(state), priority::STATE)
    }

    /// Bind a shader by resource id
    pub fn bind_shader(shader: impl Into<String>) -> Self {
        Self::new(
            CommandKind::BindShader {
                shader: shader.into(),
            },
            priority::BIND,
        )
    }

    /// Bind a texture to a slot by resource id
    pub fn bind_texture(slot: u32, texture: impl Into<String>) -> Self {
        Self::new(
            CommandKind::BindTexture {
                slot,
                texture: texture.into(),
            },
            priority::BIND,
        )
    }

    /// Bind a vertex source by resource id
    pub fn bind_vertex_source(source: impl Into<String>) -> Self {
        Self::new(
            CommandKind::BindVertexSource {
                source: source.into(),
            },
            priority::BIND,
        )
    }

    /// Bind a render target by resource id; `None` is the default target
    pub fn bind_render_target(target: Option<String>) -> Self {
        Self::new(CommandKind::BindRenderTarget { target }, priority::BIND)
    }

    /// Upload a uniform value
    pub fn set_uniform(name: impl Into<String>, value: UniformValue) -> Self {
        Self::new(
            CommandKind::SetUniform {
                name: name.into(),
                value,
            },
            priority::BIND,
        )
    }

    /// Non-indexed draw
    pub fn draw(topology: Primitive, vertex_count: u32, first_vertex: u32) -> Self {
        Self::new(
            CommandKind::Draw {
                topology,
                vertex_count,
                first_vertex,
            },
            priority::DRAW,
        )
    }

    /// Indexed draw
    pub fn draw_indexed(
        topology: Primitive,
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
    ) -> Self {
        Self::new(
            CommandKind::DrawIndexed {
                topology,
                index_count,
                first_index,
                base_vertex,
            },
            priority::DRAW,
        )
    }

    /// Instanced draw
    pub fn draw_instanced(
        topology: Primitive,
        vertex_count: u32,
        first_vertex: u32,
        instance_count: u32,
    ) -> Self {
        Self::new(
            CommandKind::DrawInstanced {
                topology,
                vertex_count,
                first_vertex,
                instance_count,
            },
            priority::DRAW,
        )
    }

    /// Instanced indexed draw
    pub fn draw_indexed_instanced(
        topology: Primitive,
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
        instance_count: u32,
    ) -> Self {
        Self::new(
            CommandKind::DrawIndexedInstanced {
                topology,
                index_count,
                first_index,
                base_vertex,
                instance_count,
            },
            priority::DRAW,
        )
    }

    /// Viewport command
    pub fn set_viewport(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self::new(
            CommandKind::SetViewport {
                x,
                y,
                width,
                height,
            },
            priority::STATE,
        )
    }

    /// Custom command, executed by calling back into the supplied closure
    pub fn custom<F>(callback: F) -> Self
    where
        F: Fn(&mut dyn RenderBackend) -> Result<(), BackendError> + 'static,
    {
        Self::new(CommandKind::Custom(Box::new(callback)), priority::CUSTOM)
    }

    /// Override the execution priority, builder style
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the secondary sort key, builder style
    pub fn with_sort_key(mut self, sort_key: u64) -> Self {
        self.sort_key = sort_key;
        self
    }

    /// Set the depth used by distance-ordered sort modes, builder style
    pub fn with_depth(mut self, depth: f32) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Set the debug label (the one mutation allowed after construction)
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn kind(&self) -> &CommandKind {
        &self.kind
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn sort_key(&self) -> u64 {
        self.sort_key
    }

    pub fn depth(&self) -> Option<f32> {
        self.depth
    }

    /// The command's type tag, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            CommandKind::Clear { .. } => "clear",
            CommandKind::SetState(_) => "set-state",
            CommandKind::BindShader { .. } => "bind-shader",
            CommandKind::BindTexture { .. } => "bind-texture",
            CommandKind::BindVertexSource { .. } => "bind-vertex-source",
            CommandKind::BindRenderTarget { .. } => "bind-render-target",
            CommandKind::SetUniform { .. } => "set-uniform",
            CommandKind::Draw { .. } => "draw",
            CommandKind::DrawIndexed { .. } => "draw-indexed",
            CommandKind::DrawInstanced { .. } => "draw-instanced",
            CommandKind::DrawIndexedInstanced { .. } => "draw-indexed-instanced",
            CommandKind::SetViewport { .. } => "set-viewport",
            CommandKind::Custom(_) => "custom",
        }
    }

    /// Whether this command issues geometry to the backend
    pub fn is_draw_call(&self) -> bool {
        matches!(
            self.kind,
            CommandKind::Draw { .. }
                | CommandKind::DrawIndexed { .. }
                | CommandKind::DrawInstanced { .. }
                | CommandKind::DrawIndexedInstanced { .. }
        )
    }

    /// Whether this command changes pipeline/binding state
    pub fn is_state_change(&self) -> bool {
        matches!(
            self.kind,
            CommandKind::SetState(_)
                | CommandKind::BindShader { .. }
                | CommandKind::BindTexture { .. }
                | CommandKind::BindVertexSource { .. }
                | CommandKind::BindRenderTarget { .. }
                | CommandKind::SetUniform { .. }
                | CommandKind::SetViewport { .. }
        )
    }

    /// Estimated triangles issued by this command.
    ///
    /// Only triangle topologies contribute; points and lines estimate zero.
    pub fn triangle_estimate(&self) -> u64 {
        let (topology, count, instances) = match self.kind {
            CommandKind::Draw {
                topology,
                vertex_count,
                ..
            } => (topology, vertex_count, 1),
            CommandKind::DrawIndexed {
                topology,
                index_count,
                ..
            } => (topology, index_count, 1),
            CommandKind::DrawInstanced {
                topology,
                vertex_count,
                instance_count,
                ..
            } => (topology, vertex_count, instance_count),
            CommandKind::DrawIndexedInstanced {
                topology,
                index_count,
                instance_count,
                ..
            } => (topology, index_count, instance_count),
            _ => return 0,
        };

        let per_instance = match topology {
            Primitive::Triangles => u64::from(count) / 3,
            Primitive::TriangleStrip => u64::from(count.saturating_sub(2)),
            Primitive::Points | Primitive::Lines | Primitive::LineStrip => 0,
        };
        per_instance * u64::from(instances)
    }
}

impl fmt::Debug for RenderCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCommand")
            .field("type", &self.type_name())
            .field("priority", &self.priority)
            .field("sort_key", &self.sort_key)
            .field("depth", &self.depth)
            .field("label", &self.label)
            .finish()
    }
}
