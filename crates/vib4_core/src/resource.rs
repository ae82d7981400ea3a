//! Reference-counted resource registry
//!
//! The `ResourceManager` owns every shared engine resource (geometry,
//! shaders, textures, buffers) behind a type-erased payload. Callers hold
//! string ids plus a counted reference; the payload itself stays owned by
//! the manager and must not be retained past the matching `release`.
//!
//! Resources registered with a content hash are deduplicated: a hash that
//! matches a live resource bumps its refcount instead of allocating a new
//! entry. Idle resources with no holders are swept by `run_gc`, oldest
//! last-access first.

use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The kinds of resource the engine shares
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Geometry,
    Shader,
    Texture,
    Buffer,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::Geometry => write!(f, "geometry"),
            ResourceType::Shader => write!(f, "shader"),
            ResourceType::Texture => write!(f, "texture"),
            ResourceType::Buffer => write!(f, "buffer"),
        }
    }
}

/// Type-erased resource payload, shared by reference with counted holders
pub type ResourcePayload = Arc<dyn Any + Send + Sync>;

type Teardown = Box<dyn FnOnce()>;
type DisposeListener = Box<dyn FnMut(&str, ResourceType)>;

/// Registration options for [`ResourceManager::register`]
#[derive(Default)]
pub struct ResourceDesc {
    size: usize,
    hash: Option<String>,
    teardown: Option<Teardown>,
    metadata: HashMap<String, String>,
}

impl ResourceDesc {
    /// Describe a resource with an estimated byte size
    pub fn new(size: usize) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// Attach a content hash for deduplication (see [`hash_key_str`] and
    /// friends for the key format)
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    /// Attach a custom teardown callback, run when the resource is disposed
    pub fn with_teardown<F: FnOnce() + 'static>(mut self, teardown: F) -> Self {
        self.teardown = Some(Box::new(teardown));
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A managed resource entry
pub struct ManagedResource {
    id: String,
    ty: ResourceType,
    payload: ResourcePayload,
    size: usize,
    refcount: u32,
    created: Instant,
    last_access: Instant,
    disposed: bool,
    hash: Option<String>,
    metadata: HashMap<String, String>,
    teardown: Option<Teardown>,
}

impl ManagedResource {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn resource_type(&self) -> ResourceType {
        self.ty
    }

    /// Borrow the payload without taking a counted reference
    pub fn payload(&self) -> &ResourcePayload {
        &self.payload
    }

    /// Estimated size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Time since creation
    pub fn age(&self) -> Duration {
        self.created.elapsed()
    }

    /// Time since the last register/acquire touch
    pub fn idle_time(&self) -> Duration {
        self.last_access.elapsed()
    }
}

/// Tuning knobs for the manager
#[derive(Clone, Debug)]
pub struct ResourceManagerConfig {
    /// Dispose a resource as soon as its refcount reaches zero
    pub auto_dispose: bool,
    /// Total estimated-bytes budget; 0 disables the limit
    pub memory_limit: usize,
    /// Fraction of the budget that triggers a synchronous GC on register
    pub gc_trigger_fraction: f32,
    /// Default idle threshold for `run_gc`
    pub min_idle: Duration,
    /// Default per-sweep disposal cap for `run_gc`
    pub max_dispose_per_gc: usize,
}

impl Default for ResourceManagerConfig {
    fn default() -> Self {
        Self {
            auto_dispose: false,
            memory_limit: 0,
            gc_trigger_fraction: 0.9,
            min_idle: Duration::from_secs(30),
            max_dispose_per_gc: 16,
        }
    }
}

/// Options for a single [`ResourceManager::run_gc`] sweep
#[derive(Default)]
pub struct GcOptions {
    max_dispose: Option<usize>,
    min_idle: Option<Duration>,
    types: Option<Vec<ResourceType>>,
}

impl GcOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of resources disposed this sweep
    pub fn with_max_dispose(mut self, max: usize) -> Self {
        self.max_dispose = Some(max);
        self
    }

    /// Only dispose resources idle at least this long
    pub fn with_min_idle(mut self, min_idle: Duration) -> Self {
        self.min_idle = Some(min_idle);
        self
    }

    /// Only consider resources of these types
    pub fn with_types(mut self, types: impl IntoIterator<Item = ResourceType>) -> Self {
        self.types = Some(types.into_iter().collect());
        self
    }
}

/// Error type for resource operations
#[derive(Debug)]
pub enum ResourceError {
    /// No resource registered under this id
    NotFound(String),
    /// The resource was disposed and can never be re-referenced
    Disposed(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound(id) => write!(f, "Resource not found: {}", id),
            ResourceError::Disposed(id) => write!(f, "Resource already disposed: {}", id),
        }
    }
}

impl std::error::Error for ResourceError {}

/// Reference-counted registry of shared engine resources
pub struct ResourceManager {
    resources: HashMap<String, ManagedResource>,
    by_type: HashMap<ResourceType, HashSet<String>>,
    by_hash: HashMap<String, String>,
    /// Ids of resources that were disposed; referencing one is an error
    tombstones: HashSet<String>,
    total_bytes: usize,
    config: ResourceManagerConfig,
    listeners: Vec<DisposeListener>,
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceManager {
    /// Create a manager with default configuration
    pub fn new() -> Self {
        Self::with_config(ResourceManagerConfig::default())
    }

    /// Create a manager with custom configuration
    pub fn with_config(config: ResourceManagerConfig) -> Self {
        Self {
            resources: HashMap::new(),
            by_type: HashMap::new(),
            by_hash: HashMap::new(),
            tombstones: HashSet::new(),
            total_bytes: 0,
            config,
            listeners: Vec::new(),
        }
    }

    /// Register a resource, returning the id that now holds a counted
    /// reference for the caller.
    ///
    /// - A desc hash matching a live resource bumps that resource's refcount
    ///   and returns *its* id (deduplication; no new entry is allocated).
    /// - Re-registering an existing id bumps its refcount.
    /// - Otherwise a new entry is created with refcount 1.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Disposed`] if the id belongs to a resource
    /// that has already been disposed.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        ty: ResourceType,
        payload: ResourcePayload,
        desc: ResourceDesc,
    ) -> Result<String, ResourceError> {
        let id = id.into();
        if self.tombstones.contains(&id) {
            return Err(ResourceError::Disposed(id));
        }

        // Content-hash deduplication
        if let Some(hash) = &desc.hash {
            if let Some(existing_id) = self.by_hash.get(hash).cloned() {
                if let Some(entry) = self.resources.get_mut(&existing_id) {
                    entry.refcount += 1;
                    entry.last_access = Instant::now();
                    log::debug!(
                        "Resource '{}' deduplicated onto '{}' (refcount {})",
                        id,
                        existing_id,
                        entry.refcount
                    );
                    return Ok(existing_id);
                }
            }
        }

        // Same-id re-registration
        if let Some(entry) = self.resources.get_mut(&id) {
            entry.refcount += 1;
            entry.last_access = Instant::now();
            log::debug!("Resource '{}' re-registered (refcount {})", id, entry.refcount);
            return Ok(id);
        }

        // Budget pressure triggers a synchronous sweep before we grow
        if self.config.memory_limit > 0 {
            let threshold =
                (self.config.memory_limit as f32 * self.config.gc_trigger_fraction) as usize;
            if self.total_bytes + desc.size > threshold {
                log::info!(
                    "Resource memory {} + {} past threshold {}; running GC",
                    self.total_bytes,
                    desc.size,
                    threshold
                );
                self.run_gc(GcOptions::new());
            }
        }

        let now = Instant::now();
        let entry = ManagedResource {
            id: id.clone(),
            ty,
            payload,
            size: desc.size,
            refcount: 1,
            created: now,
            last_access: now,
            disposed: false,
            hash: desc.hash.clone(),
            metadata: desc.metadata,
            teardown: desc.teardown,
        };

        self.total_bytes += entry.size;
        if let Some(hash) = &entry.hash {
            self.by_hash.insert(hash.clone(), id.clone());
        }
        self.by_type.entry(ty).or_default().insert(id.clone());
        self.resources.insert(id.clone(), entry);

        Ok(id)
    }

    /// Take another counted reference to a resource and borrow its payload
    ///
    /// # Errors
    ///
    /// [`ResourceError::Disposed`] for a disposed id, [`ResourceError::NotFound`]
    /// for an id that was never registered.
    pub fn acquire(&mut self, id: &str) -> Result<ResourcePayload, ResourceError> {
        if self.tombstones.contains(id) {
            return Err(ResourceError::Disposed(id.to_string()));
        }
        let entry = self
            .resources
            .get_mut(id)
            .ok_or_else(|| ResourceError::NotFound(id.to_string()))?;
        entry.refcount += 1;
        entry.last_access = Instant::now();
        Ok(Arc::clone(&entry.payload))
    }

    /// Drop a counted reference. Returns false for ids that are unknown or
    /// already disposed (a benign miss, not an error).
    ///
    /// With `auto_dispose` enabled, the last release disposes the resource.
    pub fn release(&mut self, id: &str) -> bool {
        let Some(entry) = self.resources.get_mut(id) else {
            log::debug!("Release of unknown resource '{}'", id);
            return false;
        };
        entry.refcount = entry.refcount.saturating_sub(1);
        if entry.refcount == 0 && self.config.auto_dispose {
            self.dispose_entry(id);
        }
        true
    }

    /// Whether a live resource is registered under this id
    pub fn has(&self, id: &str) -> bool {
        self.resources.contains_key(id)
    }

    /// Borrow an entry without touching its refcount or access time
    pub fn get(&self, id: &str) -> Option<&ManagedResource> {
        self.resources.get(id)
    }

    /// Number of live resources
    pub fn count(&self) -> usize {
        self.resources.len()
    }

    /// Number of live resources of one type
    pub fn count_of(&self, ty: ResourceType) -> usize {
        self.by_type.get(&ty).map(HashSet::len).unwrap_or(0)
    }

    /// Sum of estimated sizes of live resources
    pub fn memory_usage(&self) -> usize {
        self.total_bytes
    }

    /// Register a listener notified whenever a resource is disposed
    pub fn add_dispose_listener<F>(&mut self, listener: F)
    where
        F: FnMut(&str, ResourceType) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Sweep unreferenced idle resources, oldest last-access first.
    ///
    /// A resource is eligible when its refcount is zero, it has been idle at
    /// least the configured threshold, and it matches the type filter.
    /// Returns the number disposed.
    pub fn run_gc(&mut self, options: GcOptions) -> usize {
        let min_idle = options.min_idle.unwrap_or(self.config.min_idle);
        let max_dispose = options.max_dispose.unwrap_or(self.config.max_dispose_per_gc);

        let mut candidates: Vec<(String, Instant)> = self
            .resources
            .values()
            .filter(|r| r.refcount == 0)
            .filter(|r| r.idle_time() >= min_idle)
            .filter(|r| {
                options
                    .types
                    .as_ref()
                    .map(|types| types.contains(&r.ty))
                    .unwrap_or(true)
            })
            .map(|r| (r.id.clone(), r.last_access))
            .collect();

        candidates.sort_by_key(|&(_, last_access)| last_access);
        candidates.truncate(max_dispose);

        let disposed = candidates.len();
        for (id, _) in candidates {
            self.dispose_entry(&id);
        }
        if disposed > 0 {
            log::info!("Resource GC disposed {} resource(s)", disposed);
        }
        disposed
    }

    /// Dispose a resource immediately, ignoring its refcount. Returns false
    /// for unknown ids.
    pub fn force_dispose(&mut self, id: &str) -> bool {
        if !self.resources.contains_key(id) {
            return false;
        }
        self.dispose_entry(id);
        true
    }

    /// Remove the entry from every index, then notify listeners and run the
    /// teardown callback. Indexes are consistent before any callback fires.
    fn dispose_entry(&mut self, id: &str) {
        let Some(mut entry) = self.resources.remove(id) else {
            return;
        };
        if let Some(set) = self.by_type.get_mut(&entry.ty) {
            set.remove(id);
        }
        if let Some(hash) = &entry.hash {
            self.by_hash.remove(hash);
        }
        self.total_bytes = self.total_bytes.saturating_sub(entry.size);
        self.tombstones.insert(entry.id.clone());
        entry.disposed = true;

        for listener in self.listeners.iter_mut() {
            listener(&entry.id, entry.ty);
        }
        if let Some(teardown) = entry.teardown.take() {
            teardown();
        }
        log::debug!("Disposed resource '{}' ({})", entry.id, entry.ty);
    }
}

// --- Content hash keys ---
//
// Dedup keys are namespaced strings `<kind>_<numeric-hash>` with kind
// identifying what was hashed: str (text), arr (numeric slice), obj (byte
// blob), val (a single hashable value).

fn finish_key(kind: &str, hasher: DefaultHasher) -> String {
    format!("{}_{}", kind, hasher.finish())
}

/// Content key for a string payload
pub fn hash_key_str(text: &str) -> String {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    finish_key("str", hasher)
}

/// Content key for a numeric array payload (hashed bitwise)
pub fn hash_key_f32s(data: &[f32]) -> String {
    let mut hasher = DefaultHasher::new();
    for v in data {
        v.to_bits().hash(&mut hasher);
    }
    finish_key("arr", hasher)
}

/// Content key for an opaque byte payload
pub fn hash_key_bytes(data: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    finish_key("obj", hasher)
}

/// Content key for a single hashable value
pub fn hash_key_val<T: Hash>(value: &T) -> String {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    finish_key("val", hasher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn payload(text: &str) -> ResourcePayload {
        Arc::new(text.to_string())
    }

    fn auto_dispose_manager() -> ResourceManager {
        ResourceManager::with_config(ResourceManagerConfig {
            auto_dispose: true,
            ..ResourceManagerConfig::default()
        })
    }

    #[test]
    fn test_register_starts_at_refcount_one() {
        let mut rm = ResourceManager::new();
        let id = rm
            .register("shader:flat", ResourceType::Shader, payload("src"), ResourceDesc::new(64))
            .unwrap();

        assert_eq!(id, "shader:flat");
        assert!(rm.has(&id));
        assert_eq!(rm.get(&id).unwrap().refcount(), 1);
        assert_eq!(rm.count(), 1);
        assert_eq!(rm.count_of(ResourceType::Shader), 1);
        assert_eq!(rm.memory_usage(), 64);
    }

    #[test]
    fn test_acquire_and_release_adjust_refcount() {
        let mut rm = ResourceManager::new();
        rm.register("tex:a", ResourceType::Texture, payload("px"), ResourceDesc::new(16))
            .unwrap();

        rm.acquire("tex:a").unwrap();
        assert_eq!(rm.get("tex:a").unwrap().refcount(), 2);

        assert!(rm.release("tex:a"));
        assert_eq!(rm.get("tex:a").unwrap().refcount(), 1);
    }

    #[test]
    fn test_acquire_unknown_is_not_found() {
        let mut rm = ResourceManager::new();
        assert!(matches!(rm.acquire("ghost"), Err(ResourceError::NotFound(_))));
    }

    #[test]
    fn test_release_unknown_is_benign() {
        let mut rm = ResourceManager::new();
        assert!(!rm.release("ghost"));
    }

    #[test]
    fn test_auto_dispose_on_last_release() {
        let mut rm = auto_dispose_manager();
        rm.register("buf:v", ResourceType::Buffer, payload("data"), ResourceDesc::new(32))
            .unwrap();

        assert!(rm.release("buf:v"));
        assert!(!rm.has("buf:v"));
        assert_eq!(rm.memory_usage(), 0);
    }

    #[test]
    fn test_disposed_resource_cannot_be_re_referenced() {
        let mut rm = auto_dispose_manager();
        rm.register("buf:v", ResourceType::Buffer, payload("data"), ResourceDesc::new(32))
            .unwrap();
        rm.release("buf:v");

        assert!(matches!(rm.acquire("buf:v"), Err(ResourceError::Disposed(_))));
        assert!(matches!(
            rm.register("buf:v", ResourceType::Buffer, payload("data"), ResourceDesc::new(32)),
            Err(ResourceError::Disposed(_))
        ));
    }

    #[test]
    fn test_hash_dedup_returns_identical_instance() {
        let mut rm = ResourceManager::new();
        let verts: Vec<f32> = vec![0.0, 1.0, 2.0];
        let hash = hash_key_f32s(&verts);

        let first = rm
            .register(
                "geo:a",
                ResourceType::Geometry,
                Arc::new(verts.clone()),
                ResourceDesc::new(12).with_hash(hash.clone()),
            )
            .unwrap();
        let second = rm
            .register(
                "geo:b",
                ResourceType::Geometry,
                Arc::new(verts),
                ResourceDesc::new(12).with_hash(hash),
            )
            .unwrap();

        // Same id, same instance, refcount 2, and no second allocation
        assert_eq!(first, second);
        assert_eq!(rm.count(), 1);
        assert_eq!(rm.get(&first).unwrap().refcount(), 2);

        let p1 = rm.acquire(&first).unwrap();
        let p2 = rm.acquire(&second).unwrap();
        assert!(Arc::ptr_eq(&p1, &p2));
    }

    #[test]
    fn test_same_id_re_register_bumps_refcount() {
        let mut rm = ResourceManager::new();
        rm.register("tex:t", ResourceType::Texture, payload("a"), ResourceDesc::new(8))
            .unwrap();
        rm.register("tex:t", ResourceType::Texture, payload("b"), ResourceDesc::new(8))
            .unwrap();

        assert_eq!(rm.count(), 1);
        assert_eq!(rm.get("tex:t").unwrap().refcount(), 2);
    }

    #[test]
    fn test_gc_skips_referenced_resources() {
        let mut rm = ResourceManager::new();
        rm.register("held", ResourceType::Buffer, payload("x"), ResourceDesc::new(8))
            .unwrap();
        rm.register("loose", ResourceType::Buffer, payload("y"), ResourceDesc::new(8))
            .unwrap();
        rm.release("loose");

        let disposed = rm.run_gc(GcOptions::new().with_min_idle(Duration::ZERO));
        assert_eq!(disposed, 1);
        assert!(rm.has("held"));
        assert!(!rm.has("loose"));
    }

    #[test]
    fn test_gc_respects_idle_threshold() {
        let mut rm = ResourceManager::new();
        rm.register("fresh", ResourceType::Buffer, payload("x"), ResourceDesc::new(8))
            .unwrap();
        rm.release("fresh");

        // Freshly touched resources survive a large idle threshold
        let disposed = rm.run_gc(GcOptions::new().with_min_idle(Duration::from_secs(3600)));
        assert_eq!(disposed, 0);
        assert!(rm.has("fresh"));
    }

    #[test]
    fn test_gc_type_filter() {
        let mut rm = ResourceManager::new();
        rm.register("geo", ResourceType::Geometry, payload("g"), ResourceDesc::new(8))
            .unwrap();
        rm.register("tex", ResourceType::Texture, payload("t"), ResourceDesc::new(8))
            .unwrap();
        rm.release("geo");
        rm.release("tex");

        let disposed = rm.run_gc(
            GcOptions::new()
                .with_min_idle(Duration::ZERO)
                .with_types([ResourceType::Texture]),
        );
        assert_eq!(disposed, 1);
        assert!(rm.has("geo"));
        assert!(!rm.has("tex"));
    }

    #[test]
    fn test_gc_dispose_cap() {
        let mut rm = ResourceManager::new();
        for i in 0..5 {
            let id = format!("r{}", i);
            rm.register(&id, ResourceType::Buffer, payload("x"), ResourceDesc::new(8))
                .unwrap();
            rm.release(&id);
        }

        let disposed = rm.run_gc(GcOptions::new().with_min_idle(Duration::ZERO).with_max_dispose(2));
        assert_eq!(disposed, 2);
        assert_eq!(rm.count(), 3);
    }

    #[test]
    fn test_force_dispose_ignores_refcount() {
        let mut rm = ResourceManager::new();
        rm.register("held", ResourceType::Shader, payload("s"), ResourceDesc::new(8))
            .unwrap();
        rm.acquire("held").unwrap();

        assert!(rm.force_dispose("held"));
        assert!(!rm.has("held"));
        assert!(!rm.force_dispose("held"));
    }

    #[test]
    fn test_teardown_runs_after_index_removal() {
        let mut rm = ResourceManager::new();
        let seen = Rc::new(Cell::new(false));
        let flag = Rc::clone(&seen);

        rm.register(
            "torn",
            ResourceType::Texture,
            payload("t"),
            ResourceDesc::new(8).with_teardown(move || flag.set(true)),
        )
        .unwrap();

        rm.force_dispose("torn");
        assert!(seen.get());
    }

    #[test]
    fn test_dispose_listener_notified() {
        let mut rm = ResourceManager::new();
        let log: Rc<std::cell::RefCell<Vec<String>>> = Rc::default();
        let sink = Rc::clone(&log);
        rm.add_dispose_listener(move |id, ty| sink.borrow_mut().push(format!("{}:{}", ty, id)));

        rm.register("geo:x", ResourceType::Geometry, payload("g"), ResourceDesc::new(8))
            .unwrap();
        rm.force_dispose("geo:x");

        assert_eq!(log.borrow().as_slice(), ["geometry:geo:x"]);
    }

    #[test]
    fn test_memory_pressure_triggers_gc() {
        let mut rm = ResourceManager::with_config(ResourceManagerConfig {
            memory_limit: 100,
            gc_trigger_fraction: 0.5,
            min_idle: Duration::ZERO,
            ..ResourceManagerConfig::default()
        });

        rm.register("old", ResourceType::Buffer, payload("x"), ResourceDesc::new(40))
            .unwrap();
        rm.release("old");

        // 40 + 40 > 50: registration sweeps the idle resource first
        rm.register("new", ResourceType::Buffer, payload("y"), ResourceDesc::new(40))
            .unwrap();
        assert!(!rm.has("old"));
        assert!(rm.has("new"));
        assert_eq!(rm.memory_usage(), 40);
    }

    #[test]
    fn test_dedup_removed_after_dispose() {
        let mut rm = ResourceManager::new();
        let hash = hash_key_str("contents");
        rm.register(
            "a",
            ResourceType::Shader,
            payload("contents"),
            ResourceDesc::new(8).with_hash(hash.clone()),
        )
        .unwrap();
        rm.force_dispose("a");

        // The hash index must not resurrect a disposed resource
        let id = rm
            .register(
                "b",
                ResourceType::Shader,
                payload("contents"),
                ResourceDesc::new(8).with_hash(hash),
            )
            .unwrap();
        assert_eq!(id, "b");
        assert_eq!(rm.get("b").unwrap().refcount(), 1);
    }

    #[test]
    fn test_metadata_preserved() {
        let mut rm = ResourceManager::new();
        rm.register(
            "m",
            ResourceType::Texture,
            payload("t"),
            ResourceDesc::new(8).with_metadata("format", "rgba8"),
        )
        .unwrap();

        assert_eq!(
            rm.get("m").unwrap().metadata().get("format").map(String::as_str),
            Some("rgba8")
        );
    }

    #[test]
    fn test_hash_key_formats() {
        assert!(hash_key_str("abc").starts_with("str_"));
        assert!(hash_key_f32s(&[1.0, 2.0]).starts_with("arr_"));
        assert!(hash_key_bytes(b"bytes").starts_with("obj_"));
        assert!(hash_key_val(&42u64).starts_with("val_"));

        // Deterministic and content-sensitive
        assert_eq!(hash_key_str("abc"), hash_key_str("abc"));
        assert_ne!(hash_key_str("abc"), hash_key_str("abd"));
        assert_ne!(hash_key_f32s(&[1.0]), hash_key_f32s(&[2.0]));
    }
}
