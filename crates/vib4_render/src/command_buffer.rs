//! Command recording, sorting, and execution
//!
//! A `CommandBuffer` records [`RenderCommand`]s between `begin` and `end`,
//! sorts them once per mutation according to its sort mode, and dispatches
//! them to a [`RenderBackend`]. Execution classifies commands into draw-call
//! and state-change counters and accumulates a triangle estimate; the
//! profiled variant also measures wall time.

use std::cmp::Ordering;
use std::fmt;
use std::time::{Duration, Instant};

use crate::backend::{BackendError, RenderBackend};
use crate::command::{CommandKind, RenderCommand};

/// Comparator for [`SortMode::Custom`]
pub type SortComparator = Box<dyn Fn(&RenderCommand, &RenderCommand) -> Ordering>;

/// How `sort` orders the recorded commands
pub enum SortMode {
    /// Keep insertion order
    None,
    /// Priority descending, then sort key ascending (the default):
    /// clears run before state changes before binds before draws
    State,
    /// Depth ascending (opaque-pass optimization); missing depth sorts as 0
    FrontToBack,
    /// Depth descending (required for blended draws); missing depth sorts as 0
    BackToFront,
    /// Delegate entirely to a supplied comparator
    Custom(SortComparator),
}

impl fmt::Debug for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortMode::None => "None",
            SortMode::State => "State",
            SortMode::FrontToBack => "FrontToBack",
            SortMode::BackToFront => "BackToFront",
            SortMode::Custom(_) => "Custom",
        };
        write!(f, "SortMode::{}", name)
    }
}

/// Running statistics over the recorded commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Commands recorded
    pub commands: usize,
    /// Draw commands executed
    pub draw_calls: usize,
    /// State/bind commands executed
    pub state_changes: usize,
    /// Estimated triangles issued (triangle topologies only)
    pub triangles: u64,
}

/// Result of a profiled execution
#[derive(Clone, Copy, Debug)]
pub struct FrameProfile {
    /// Wall time spent dispatching
    pub cpu_time: Duration,
    /// Statistics for the executed commands
    pub stats: BufferStats,
}

/// Records and schedules render commands against a pluggable backend
pub struct CommandBuffer {
    recording: bool,
    commands: Vec<RenderCommand>,
    sort_mode: SortMode,
    needs_sort: bool,
    stats: BufferStats,
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBuffer {
    /// Create a buffer using the default state sort
    pub fn new() -> Self {
        Self::with_sort_mode(SortMode::State)
    }

    /// Create a buffer with an explicit sort mode
    pub fn with_sort_mode(sort_mode: SortMode) -> Self {
        Self {
            recording: false,
            commands: Vec::new(),
            sort_mode,
            needs_sort: false,
            stats: BufferStats::default(),
        }
    }

    /// Enter recording mode, discarding previously recorded commands
    pub fn begin(&mut self) {
        self.commands.clear();
        self.stats = BufferStats::default();
        self.needs_sort = false;
        self.recording = true;
    }

    /// Enter recording mode, keeping previously recorded commands
    pub fn begin_preserving(&mut self) {
        self.recording = true;
    }

    /// Exit recording mode
    pub fn end(&mut self) {
        self.recording = false;
    }

    /// Record one command.
    ///
    /// Outside recording mode the command is dropped with a diagnostic
    /// warning.
    pub fn add(&mut self, command: RenderCommand) {
        if !self.recording {
            log::warn!(
                "CommandBuffer::add({}) outside begin/end; command dropped",
                command.type_name()
            );
            return;
        }
        self.commands.push(command);
        self.stats.commands += 1;
        self.needs_sort = true;
    }

    /// Record a batch of commands
    pub fn add_all(&mut self, commands: impl IntoIterator<Item = RenderCommand>) {
        for command in commands {
            self.add(command);
        }
    }

    /// Change the sort mode; the next `sort` or `execute` re-orders
    pub fn set_sort_mode(&mut self, sort_mode: SortMode) {
        self.sort_mode = sort_mode;
        self.needs_sort = true;
    }

    pub fn sort_mode(&self) -> &SortMode {
        &self.sort_mode
    }

    /// Apply the configured ordering. A no-op until mutation invalidates the
    /// previous sort; stable, so equal commands keep insertion order.
    pub fn sort(&mut self) {
        if !self.needs_sort {
            return;
        }
        match &self.sort_mode {
            SortMode::None => {}
            SortMode::State => {
                self.commands.sort_by(|a, b| {
                    b.priority()
                        .cmp(&a.priority())
                        .then(a.sort_key().cmp(&b.sort_key()))
                });
            }
            SortMode::FrontToBack => {
                self.commands.sort_by(|a, b| {
                    let da = a.depth().unwrap_or(0.0);
                    let db = b.depth().unwrap_or(0.0);
                    da.partial_cmp(&db).unwrap_or(Ordering::Equal)
                });
            }
            SortMode::BackToFront => {
                self.commands.sort_by(|a, b| {
                    let da = a.depth().unwrap_or(0.0);
                    let db = b.depth().unwrap_or(0.0);
                    db.partial_cmp(&da).unwrap_or(Ordering::Equal)
                });
            }
            SortMode::Custom(comparator) => {
                self.commands.sort_by(|a, b| comparator(a, b));
            }
        }
        self.needs_sort = false;
    }

    /// Sort if needed, then dispatch every command to the backend in order.
    ///
    /// A command whose type the backend does not implement stops execution
    /// with the backend's error.
    pub fn execute(&mut self, backend: &mut dyn RenderBackend) -> Result<(), BackendError> {
        if self.recording {
            log::warn!("CommandBuffer::execute while still recording; did you forget end()?");
        }
        self.sort();

        let mut stats = BufferStats {
            commands: self.commands.len(),
            ..BufferStats::default()
        };

        for command in &self.commands {
            if command.is_draw_call() {
                stats.draw_calls += 1;
                stats.triangles += command.triangle_estimate();
            } else if command.is_state_change() {
                stats.state_changes += 1;
            }
            dispatch(command, backend)?;
        }

        self.stats = stats;
        Ok(())
    }

    /// Execute with wall-time measurement
    pub fn execute_profiled(
        &mut self,
        backend: &mut dyn RenderBackend,
    ) -> Result<FrameProfile, BackendError> {
        let started = Instant::now();
        self.execute(backend)?;
        Ok(FrameProfile {
            cpu_time: started.elapsed(),
            stats: self.stats,
        })
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Statistics from recording and the most recent execution
    pub fn stats(&self) -> BufferStats {
        self.stats
    }

    /// The recorded commands in their current order
    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }
}

/// Explicit dispatch from command payload to backend entry point
fn dispatch(command: &RenderCommand, backend: &mut dyn RenderBackend) -> Result<(), BackendError> {
    match command.kind() {
        CommandKind::Clear {
            flags,
            color,
            depth,
            stencil,
        } => backend.clear(*flags, *color, *depth, *stencil),
        CommandKind::SetState(state) => backend.set_state(state),
        CommandKind::BindShader { shader } => backend.bind_shader(shader),
        CommandKind::BindTexture { slot, texture } => backend.bind_texture(*slot, texture),
        CommandKind::BindVertexSource { source } => backend.bind_vertex_array(source),
        CommandKind::BindRenderTarget { target } => backend.bind_render_target(target.as_deref()),
        CommandKind::SetUniform { name, value } => backend.set_uniform(name, value),
        CommandKind::Draw {
            topology,
            vertex_count,
            first_vertex,
        } => backend.draw(*topology, *vertex_count, *first_vertex),
        CommandKind::DrawIndexed {
            topology,
            index_count,
            first_index,
            base_vertex,
        } => backend.draw_indexed(*topology, *index_count, *first_index, *base_vertex),
        CommandKind::DrawInstanced {
            topology,
            vertex_count,
            first_vertex,
            instance_count,
        } => backend.draw_instanced(*topology, *vertex_count, *first_vertex, *instance_count),
        CommandKind::DrawIndexedInstanced {
            topology,
            index_count,
            first_index,
            base_vertex,
            instance_count,
        } => backend.draw_indexed_instanced(
            *topology,
            *index_count,
            *first_index,
            *base_vertex,
            *instance_count,
        ),
        CommandKind::SetViewport {
            x,
            y,
            width,
            height,
        } => backend.set_viewport(*x, *y, *width, *height),
        CommandKind::Custom(callback) => callback(backend),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TraceBackend;
    use crate::command::{ClearFlags, Primitive, RenderState};

    fn record(buffer: &mut CommandBuffer, commands: Vec<RenderCommand>) {
        buffer.begin();
        buffer.add_all(commands);
        buffer.end();
    }

    #[test]
    fn test_state_sort_puts_clear_before_draw() {
        let mut buffer = CommandBuffer::new();
        // Deliberately record the draw first
        record(
            &mut buffer,
            vec![
                RenderCommand::draw(Primitive::Triangles, 3, 0),
                RenderCommand::clear(ClearFlags::ALL, [0.0; 4]),
            ],
        );

        let mut backend = TraceBackend::new();
        buffer.execute(&mut backend).unwrap();

        assert!(backend.ops()[0].starts_with("clear"));
        assert!(backend.ops()[1].starts_with("draw"));
    }

    #[test]
    fn test_state_sort_breaks_ties_by_sort_key() {
        let mut buffer = CommandBuffer::new();
        record(
            &mut buffer,
            vec![
                RenderCommand::bind_shader("later").with_sort_key(2),
                RenderCommand::bind_shader("sooner").with_sort_key(1),
            ],
        );

        let mut backend = TraceBackend::new();
        buffer.execute(&mut backend).unwrap();
        assert_eq!(backend.ops()[0], "bind_shader(sooner)");
        assert_eq!(backend.ops()[1], "bind_shader(later)");
    }

    #[test]
    fn test_back_to_front_orders_by_descending_depth() {
        let mut buffer = CommandBuffer::with_sort_mode(SortMode::BackToFront);
        record(
            &mut buffer,
            vec![
                RenderCommand::draw(Primitive::Triangles, 3, 0).with_depth(10.0),
                RenderCommand::draw(Primitive::Triangles, 6, 0).with_depth(5.0),
                RenderCommand::draw(Primitive::Triangles, 9, 0).with_depth(15.0),
            ],
        );

        let mut backend = TraceBackend::new();
        buffer.execute(&mut backend).unwrap();

        // Depths {10, 5, 15} execute as {15, 10, 5}
        assert_eq!(backend.ops()[0], "draw(Triangles, 9, 0)");
        assert_eq!(backend.ops()[1], "draw(Triangles, 3, 0)");
        assert_eq!(backend.ops()[2], "draw(Triangles, 6, 0)");
    }

    #[test]
    fn test_front_to_back_orders_by_ascending_depth() {
        let mut buffer = CommandBuffer::with_sort_mode(SortMode::FrontToBack);
        record(
            &mut buffer,
            vec![
                RenderCommand::draw(Primitive::Triangles, 3, 0).with_depth(10.0),
                RenderCommand::draw(Primitive::Triangles, 6, 0).with_depth(5.0),
            ],
        );

        let mut backend = TraceBackend::new();
        buffer.execute(&mut backend).unwrap();
        assert_eq!(backend.ops()[0], "draw(Triangles, 6, 0)");
        assert_eq!(backend.ops()[1], "draw(Triangles, 3, 0)");
    }

    #[test]
    fn test_none_mode_keeps_insertion_order() {
        let mut buffer = CommandBuffer::with_sort_mode(SortMode::None);
        record(
            &mut buffer,
            vec![
                RenderCommand::draw(Primitive::Triangles, 3, 0),
                RenderCommand::clear(ClearFlags::ALL, [0.0; 4]),
            ],
        );

        let mut backend = TraceBackend::new();
        buffer.execute(&mut backend).unwrap();
        assert!(backend.ops()[0].starts_with("draw"));
        assert!(backend.ops()[1].starts_with("clear"));
    }

    #[test]
    fn test_custom_comparator() {
        // Reverse insertion order via descending sort key
        let mut buffer = CommandBuffer::with_sort_mode(SortMode::Custom(Box::new(|a, b| {
            b.sort_key().cmp(&a.sort_key())
        })));
        record(
            &mut buffer,
            vec![
                RenderCommand::bind_shader("first").with_sort_key(1),
                RenderCommand::bind_shader("second").with_sort_key(2),
            ],
        );

        let mut backend = TraceBackend::new();
        buffer.execute(&mut backend).unwrap();
        assert_eq!(backend.ops()[0], "bind_shader(second)");
    }

    #[test]
    fn test_add_outside_recording_is_dropped() {
        let mut buffer = CommandBuffer::new();
        buffer.add(RenderCommand::clear(ClearFlags::ALL, [0.0; 4]));
        assert!(buffer.is_empty());
        assert_eq!(buffer.stats().commands, 0);
    }

    #[test]
    fn test_begin_clears_and_begin_preserving_keeps() {
        let mut buffer = CommandBuffer::new();
        record(&mut buffer, vec![RenderCommand::clear(ClearFlags::ALL, [0.0; 4])]);
        assert_eq!(buffer.len(), 1);

        buffer.begin_preserving();
        buffer.add(RenderCommand::draw(Primitive::Triangles, 3, 0));
        buffer.end();
        assert_eq!(buffer.len(), 2);

        buffer.begin();
        buffer.end();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_sort_applies_once_until_invalidated() {
        let mut buffer = CommandBuffer::new();
        record(
            &mut buffer,
            vec![
                RenderCommand::draw(Primitive::Triangles, 3, 0),
                RenderCommand::clear(ClearFlags::ALL, [0.0; 4]),
            ],
        );

        buffer.sort();
        assert!(buffer.commands()[0].type_name() == "clear");

        // Adding invalidates the sort
        buffer.begin_preserving();
        buffer.add(RenderCommand::clear(ClearFlags::COLOR, [1.0; 4]).with_sort_key(1));
        buffer.end();
        buffer.sort();
        assert_eq!(buffer.commands()[1].type_name(), "clear");
    }

    #[test]
    fn test_execute_collects_stats() {
        let mut buffer = CommandBuffer::new();
        record(
            &mut buffer,
            vec![
                RenderCommand::clear(ClearFlags::ALL, [0.0; 4]),
                RenderCommand::set_state(RenderState::default()),
                RenderCommand::bind_shader("shader:flat"),
                RenderCommand::draw(Primitive::Triangles, 9, 0),
                RenderCommand::draw(Primitive::Points, 100, 0),
            ],
        );

        let mut backend = TraceBackend::new();
        buffer.execute(&mut backend).unwrap();

        let stats = buffer.stats();
        assert_eq!(stats.commands, 5);
        assert_eq!(stats.draw_calls, 2);
        assert_eq!(stats.state_changes, 2);
        // Only the triangle draw contributes
        assert_eq!(stats.triangles, 3);
    }

    #[test]
    fn test_execute_profiled_measures_time() {
        let mut buffer = CommandBuffer::new();
        record(&mut buffer, vec![RenderCommand::clear(ClearFlags::ALL, [0.0; 4])]);

        let mut backend = TraceBackend::new();
        let profile = buffer.execute_profiled(&mut backend).unwrap();
        assert_eq!(profile.stats.commands, 1);
        // Wall time is measured (zero is possible on coarse clocks, but it exists)
        assert!(profile.cpu_time >= Duration::ZERO);
    }

    #[test]
    fn test_missing_backend_method_surfaces_error() {
        struct DrawlessBackend;
        impl RenderBackend for DrawlessBackend {
            fn clear(
                &mut self,
                _flags: ClearFlags,
                _color: [f32; 4],
                _depth: f32,
                _stencil: u32,
            ) -> Result<(), BackendError> {
                Ok(())
            }
        }

        let mut buffer = CommandBuffer::new();
        record(
            &mut buffer,
            vec![
                RenderCommand::clear(ClearFlags::ALL, [0.0; 4]),
                RenderCommand::draw(Primitive::Triangles, 3, 0),
            ],
        );

        let mut backend = DrawlessBackend;
        let err = buffer.execute(&mut backend).unwrap_err();
        assert!(matches!(err, BackendError::Unsupported("draw")));
    }

    #[test]
    fn test_custom_command_executes_against_backend() {
        let mut buffer = CommandBuffer::with_sort_mode(SortMode::None);
        buffer.begin();
        buffer.add(RenderCommand::custom(|backend| {
            backend.bind_shader("from-custom")
        }));
        buffer.end();

        let mut backend = TraceBackend::new();
        buffer.execute(&mut backend).unwrap();
        assert_eq!(backend.ops(), ["bind_shader(from-custom)"]);
    }
}
