mod camera;
mod components;
mod config;
mod engine;
mod fsm;
mod lightmap;
mod renderer;
mod scene;
mod shadow;
mod systems;

use anyhow::{anyhow, Result};
use camera::Camera;
use clap::Parser;
use config::{Args, LIGHT_NUDGE_STEP};
use engine::input::{InputEvent, InputState};
use engine::time::FrameTimer;
use engine::window::ViewerWindow;
use glam::Vec3;
use lightmap::{BakeError, BakeEvent, LightmapBaker};
use log::{debug, error, info, warn};
use renderer::uniforms::FrameContext;
use renderer::Renderer;
use scene::Scene;
use sdl2::keyboard::Scancode;
use systems::transform_system;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let sdl = sdl2::init().map_err(|e| anyhow!("failed to init SDL2: {e}"))?;
    let window = ViewerWindow::new(&sdl, "Penumbra", args.width, args.height)?;

    // Spinning instances stay put while baking so the lightmap keeps matching.
    let animate = !args.bake;
    let mut scene = Scene::load(&args.config_dir, animate);
    let mut renderer = Renderer::new(args.render_settings(), scene.directional_lights.len(), window.size())?;
    let mut baker = LightmapBaker::new(args.bake_settings(), args.bake_budget());

    let mut event_pump = sdl.event_pump().map_err(|e| anyhow!("failed to get event pump: {e}"))?;
    let mut input = InputState::new();
    let mut timer = FrameTimer::new();
    let mut camera = Camera::new(Vec3::new(0.0, -1.0, 8.0));
    camera.pitch = -15.0;
    let mut blinn = false;

    if args.bake {
        info!("Baking enabled: Space bakes the lightmap, C cancels");
    }

    loop {
        timer.tick();
        input.update(&mut event_pump);
        if input.should_quit() {
            break;
        }

        for event in &input.events {
            match *event {
                InputEvent::KeyPressed(Scancode::Num1) => {
                    blinn = !blinn;
                    info!("{} specular", if blinn { "Blinn-Phong" } else { "Phong" });
                }
                InputEvent::KeyPressed(Scancode::Space) if args.bake => {
                    if let Err(e) = baker.trigger(&scene.bake_geometry) {
                        error!("Bake could not start: {e}");
                    }
                }
                InputEvent::KeyPressed(Scancode::C) => baker.cancel(),
                InputEvent::KeyPressed(Scancode::Tab) => {
                    let settings = renderer.settings();
                    let algorithm = settings.shadow_algorithm.next();
                    let resolution = settings.shadow_resolution;
                    renderer.reallocate_shadows(algorithm, scene.directional_lights.len(), resolution);
                }
                InputEvent::MouseCaptured => sdl.mouse().set_relative_mouse_mode(true),
                InputEvent::Resized(w, h) => renderer.set_window_size(w, h),
                _ => {}
            }
        }

        if let Some(sun) = scene.directional_lights.first_mut() {
            if input.is_key_held(Scancode::Up) {
                sun.nudge(-LIGHT_NUDGE_STEP, 0.0);
            }
            if input.is_key_held(Scancode::Down) {
                sun.nudge(LIGHT_NUDGE_STEP, 0.0);
            }
            if input.is_key_held(Scancode::Left) {
                sun.nudge(0.0, -LIGHT_NUDGE_STEP);
            }
            if input.is_key_held(Scancode::Right) {
                sun.nudge(0.0, LIGHT_NUDGE_STEP);
            }
        }

        camera.look(input.mouse_dx, input.mouse_dy);
        camera.move_wasd(&input, timer.dt);
        transform_system(&mut scene.world, timer.elapsed, scene.animate);

        if baker.is_running() {
            let finished = baker.update(&mut |view| renderer.draw_bake_view(&scene, view));
            renderer.restore_default_target();
            match finished {
                Some(Ok(data)) => {
                    let settings = baker.settings();
                    renderer.upload_lightmap(settings.width, settings.height, &data);
                }
                Some(Err(BakeError::Cancelled)) => warn!("Bake cancelled"),
                Some(Err(e)) => error!("Bake failed: {e}"),
                None => {}
            }
        }
        if let Some(handle) = baker.handle() {
            for event in handle.events() {
                match event {
                    BakeEvent::Started { triangles, texels } => {
                        info!("Bake started: {triangles} triangles, {texels} texels")
                    }
                    BakeEvent::Progress(percent) => debug!("Bake progress event: {percent:.1}%"),
                    BakeEvent::Finished { output: Some(output), elapsed } => {
                        info!("Bake written to {} in {:.1}s", output.display(), elapsed.as_secs_f32())
                    }
                    BakeEvent::Finished { output: None, elapsed } => {
                        info!("Bake finished unsaved in {:.1}s", elapsed.as_secs_f32())
                    }
                    BakeEvent::Cancelled | BakeEvent::Failed(_) => {}
                }
            }
        }

        let frame = FrameContext {
            view: camera.view_matrix(),
            projection: camera.projection_matrix(window.aspect_ratio()),
            camera_position: camera.position,
            blinn,
        };
        renderer.draw_frame(&mut scene, &frame);

        window.swap();
    }

    Ok(())
}
