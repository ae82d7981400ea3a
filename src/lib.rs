//! vib4 - runtime core of a 4D visualization engine
//!
//! The engine is split across three crates, re-exported here:
//!
//! - [`vib4_math`] - `Vec4`, `Rotor4`, `Mat4`, `Affine4`
//! - [`vib4_core`] - scene graph, resource lifecycle, pools, disposal
//! - [`vib4_render`] - render commands, command buffer, backend contract
//!
//! [`config::EngineConfig`] wires TOML/env configuration into the core
//! types; the `vib4` binary is a headless walkthrough of the whole stack.

pub mod config;

pub use vib4_math::{mat4, Affine4, Mat4, RotationPlane, Rotor4, Vec4};
pub use vib4_core::{
    hash_key_bytes, hash_key_f32s, hash_key_str, hash_key_val, BufferPool, CompositeDisposable,
    DisposalError, DisposalGraph, DisposeKey, DisposeState, GcOptions, ManagedResource, Node,
    NodeDirty, NodeDocument, NodeId, NodeKey, ObjectPool, PoolStats, Pooled, RaycastHit,
    ResourceDesc, ResourceError, ResourceManager, ResourceManagerConfig, ResourcePayload,
    ResourceType, Scene, SceneDocument, SceneError, SerialDisposable,
    SingleAssignmentDisposable, Transform4, TraverseOrder, MIN_BUFFER_LEN,
};
pub use vib4_render::{
    priority, BackendError, BlendMode, BufferStats, ClearFlags, CommandBuffer, CommandKind,
    CullMode, FrameProfile, Primitive, RenderBackend, RenderCommand, RenderState, SortMode,
    TraceBackend, UniformValue,
};
