//! vrscene - scene graph culling demo
//!
//! Builds a grid scene, orbits a camera around it and culls every frame.

use std::f32::consts::TAU;
use vrscene::config::AppConfig;
use vrscene::scene::SceneBuilder;
use vrscene::systems::CullingSystem;
use vrscene_core::Vec3;
use vrscene_physics::BodyParams;

fn main() {
    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load config: {}. Using defaults.", e);
        AppConfig::default()
    });

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.debug.log_level.as_str()))
        .init();
    log::info!("Starting vrscene");

    let mut builder = SceneBuilder::new("demo")
        .with_physics(config.physics.to_world_config())
        .with_visibility_check_frames(config.culling.visibility_check_frames)
        .add_grid("blocks", 6, 6, 3.0, 0.5)
        .add_cube("marker", Vec3::new(0.0, 4.0, 0.0), 1.0)
        .add_rigid_body("marker", BodyParams::default());

    if let Some(path) = &config.physics.physics_file {
        builder = match builder.load_physics_file(path, config.physics.ignore_up_axis) {
            Ok((builder, report)) => {
                log::info!("Physics file '{}': {:?}", path, report);
                builder
            }
            Err(e) => {
                log::error!("Failed to load physics file '{}': {}", path, e);
                return;
            }
        };
    }
    let built = builder.build();

    let mut culling = CullingSystem::new(config.camera.clone(), &config.culling);
    let start = config.camera.position();
    let radius = Vec3::new(start.x, 0.0, start.z).length();
    let frames = config.culling.frames.max(1);

    let mut total_visible = 0;
    for frame in 0..frames {
        let angle = TAU * frame as f32 / frames as f32;
        let eye = Vec3::new(radius * angle.sin(), start.y, radius * angle.cos());
        let report = culling.update(built.scene.root(), eye);
        total_visible += report.output.visible.len();
        log::info!(
            "frame {:3}: {:2} visible, tested {:2}, culled {:2}, uploads {:2}",
            report.frame,
            report.output.visible.len(),
            report.output.stats.tested,
            report.output.stats.culled_subtrees,
            report.uploads
        );
    }

    if let Some(physics) = &built.physics {
        let physics = physics.lock();
        log::info!(
            "physics: {} bodies, {} constraints ({} active)",
            physics.body_count(),
            physics.constraint_count(),
            physics.active_constraint_count()
        );
    }
    log::info!(
        "Done: {} frames, {:.1} visible per frame",
        frames,
        total_visible as f32 / frames as f32
    );
}
