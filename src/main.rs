//! vib4 headless demo
//!
//! Builds a small 4D scene, runs an update pass, registers shared resources,
//! records a command buffer, and executes it against the trace backend.
//! Useful as a smoke test of the whole engine core without a window or GPU.

use std::sync::Arc;

use vib4::config::EngineConfig;
use vib4::{
    hash_key_f32s, ClearFlags, CommandBuffer, Primitive, RenderCommand, RenderState,
    ResourceDesc, ResourceManager, ResourceType, RotationPlane, Rotor4, Scene, TraceBackend,
    TraverseOrder, Vec4,
};

fn main() {
    env_logger::init();

    let config = EngineConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config: {}. Using defaults.", e);
        EngineConfig::default()
    });

    // --- Scene graph ---

    let mut scene = Scene::new("demo");
    let pivot = scene.add("pivot");
    let tesseract = scene.add("tesseract");
    scene.attach(tesseract, pivot).expect("attach tesseract under pivot");

    scene
        .set_position(pivot, Vec4::new(10.0, 0.0, 0.0, 0.0))
        .expect("pivot exists");
    scene
        .set_position(tesseract, Vec4::new(5.0, 0.0, 0.0, 0.0))
        .expect("tesseract exists");
    scene
        .set_rotation(pivot, Rotor4::from_plane_angle(RotationPlane::ZW, 0.3))
        .expect("pivot exists");

    scene.on_update(|scene, dt| {
        if let Some(key) = scene.find_by_name("pivot") {
            let rotation = scene.node(key).map(|n| n.transform().rotation);
            if let Some(rotation) = rotation {
                let spin = Rotor4::from_plane_angle(RotationPlane::XW, 0.5 * dt);
                let _ = scene.set_rotation(key, spin.compose(&rotation).normalize());
            }
        }
    });

    scene.update(1.0 / 60.0);

    let world = scene.world_position(tesseract).expect("tesseract is attached");
    log::info!(
        "Scene '{}' with {} node(s); tesseract world position ({:.2}, {:.2}, {:.2}, {:.2})",
        scene.name,
        scene.node_count(),
        world.x,
        world.y,
        world.z,
        world.w
    );

    let mut names = Vec::new();
    scene.traverse(TraverseOrder::PreOrder, true, |_, node| {
        names.push(node.name.clone());
    });
    log::info!("Visible tree: {}", names.join(" -> "));

    // --- Resources (with content-hash deduplication) ---

    let mut resources = ResourceManager::with_config(config.resources.to_manager_config());
    let vertices: Vec<f32> = vec![
        -1.0, -1.0, -1.0, -1.0, //
        1.0, -1.0, -1.0, -1.0, //
        1.0, 1.0, -1.0, -1.0, //
        -1.0, 1.0, -1.0, -1.0,
    ];
    let hash = hash_key_f32s(&vertices);
    let size = vertices.len() * std::mem::size_of::<f32>();

    let geometry = resources
        .register(
            "geo:tesseract",
            ResourceType::Geometry,
            Arc::new(vertices.clone()),
            ResourceDesc::new(size).with_hash(hash.clone()),
        )
        .expect("fresh id");
    // Same content registered again resolves to the same resource
    let duplicate = resources
        .register(
            "geo:tesseract-copy",
            ResourceType::Geometry,
            Arc::new(vertices),
            ResourceDesc::new(size).with_hash(hash),
        )
        .expect("dedup never errors on live resources");
    log::info!(
        "Registered geometry '{}' (dedup of '{}' -> refcount {})",
        geometry,
        duplicate,
        resources.get(&geometry).map(|r| r.refcount()).unwrap_or(0)
    );

    let shader = resources
        .register(
            "shader:flat",
            ResourceType::Shader,
            Arc::new(String::from("flat")),
            ResourceDesc::new(256),
        )
        .expect("fresh id");

    // --- Command buffer ---

    let mut buffer = CommandBuffer::with_sort_mode(config.render.sort_mode());
    buffer.begin();
    // Recorded deliberately out of pass order; the sort fixes it
    buffer.add(RenderCommand::draw_indexed(Primitive::Triangles, 36, 0, 0).with_depth(12.0));
    buffer.add(RenderCommand::bind_shader(shader.clone()));
    buffer.add(RenderCommand::bind_vertex_source(geometry.clone()));
    buffer.add(RenderCommand::set_state(RenderState::default()));
    buffer.add(RenderCommand::set_viewport(0, 0, 1280, 720));
    buffer.add(RenderCommand::clear(ClearFlags::ALL, [0.02, 0.02, 0.05, 1.0]));
    buffer.end();

    let mut backend = TraceBackend::new();
    let result = if config.render.profiling {
        buffer.execute_profiled(&mut backend).map(|profile| {
            log::info!("Executed in {:?}", profile.cpu_time);
        })
    } else {
        buffer.execute(&mut backend)
    };
    if let Err(err) = result {
        log::error!("Command buffer execution failed: {}", err);
        std::process::exit(1);
    }

    let stats = buffer.stats();
    log::info!(
        "Executed {} command(s): {} draw call(s), {} state change(s), ~{} triangle(s)",
        stats.commands,
        stats.draw_calls,
        stats.state_changes,
        stats.triangles
    );
    for op in backend.ops() {
        log::debug!("  {}", op);
    }

    // --- Teardown ---

    resources.release(&duplicate);
    resources.release(&geometry);
    resources.release(&shader);
    let swept = resources.run_gc(vib4::GcOptions::new().with_min_idle(std::time::Duration::ZERO));
    log::info!(
        "GC disposed {} resource(s); {} remaining, {} byte(s) tracked",
        swept,
        resources.count(),
        resources.memory_usage()
    );

    scene.clear();
    log::info!("Scene cleared; {} node(s) remain attached", scene.node_count());
}
