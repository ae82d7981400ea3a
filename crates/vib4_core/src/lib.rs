//! Engine core for vib4
//!
//! This crate provides the runtime structures the engine is built around:
//!
//! - [`Transform4`] - position, rotation, and per-axis scale in 4D space
//! - [`Node`] / [`Scene`] - arena-backed hierarchy with cached world
//!   transforms, deferred structural mutation, and spatial queries
//! - [`ResourceManager`] - reference-counted registry of shared resources
//!   with hash deduplication and idle-based garbage collection
//! - [`ObjectPool`] / [`BufferPool`] - object and bulk-buffer recycling
//! - [`DisposalGraph`] - cascading, dependency-ordered teardown

mod transform;
mod node;
mod scene;
mod resource;
mod pool;
mod disposal;

pub use transform::Transform4;
pub use node::{Node, NodeDirty, NodeId, NodeKey};
pub use scene::{
    NodeDocument, RaycastHit, Scene, SceneDocument, SceneError, TraverseOrder,
};
pub use resource::{
    hash_key_bytes, hash_key_f32s, hash_key_str, hash_key_val, GcOptions, ManagedResource,
    ResourceDesc, ResourceError, ResourceManager, ResourceManagerConfig, ResourcePayload,
    ResourceType,
};
pub use pool::{BufferPool, ObjectPool, PoolStats, Pooled, MIN_BUFFER_LEN};
pub use disposal::{
    CompositeDisposable, DisposalError, DisposalGraph, DisposeKey, DisposeState,
    SerialDisposable, SingleAssignmentDisposable,
};

// Re-export the math types the core's public API is expressed in
pub use vib4_math::{mat4, Affine4, Mat4, RotationPlane, Rotor4, Vec4};
