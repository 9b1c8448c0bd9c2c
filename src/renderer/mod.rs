pub mod mesh;
pub mod model;
pub mod shader;
pub mod target;
pub mod texture;
pub mod uniforms;

use glam::Vec3;
use hecs::World;
use log::{info, warn};
use mesh::FullscreenQuad;
use model::ModelStore;
use shader::{ShaderError, ShaderProgram};
use texture::Texture2D;
use uniforms::{FrameContext, SceneInputs, SceneUniformBinder};

use crate::components::{GlobalTransform, ModelHandle};
use crate::config::RenderSettings;
use crate::lightmap::context::HemicubeView;
use crate::scene::Scene;
use crate::shadow::pass::{ShadowPassDriver, ShadowPrograms};
use crate::shadow::targets::ShadowTargetSet;
use crate::shadow::transform::LightProjection;
use crate::shadow::ShadowAlgorithm;

const SCENE_VERT: &str = include_str!("../../shaders/scene.vert");
const SCENE_FRAG: &str = include_str!("../../shaders/scene.frag");
const DEPTH_VERT: &str = include_str!("../../shaders/shadow_depth.vert");
const DEPTH_FRAG: &str = include_str!("../../shaders/shadow_depth.frag");
const BLUR_VERT: &str = include_str!("../../shaders/vsm_blur.vert");
const BLUR_FRAG: &str = include_str!("../../shaders/vsm_blur.frag");

const CLEAR_COLOR: Vec3 = Vec3::new(0.1, 0.1, 0.1);

pub struct Renderer {
    scene_shader: ShaderProgram,
    depth_shader: ShaderProgram,
    blur_shader: ShaderProgram,
    shadow_targets: ShadowTargetSet,
    shadow_pass: ShadowPassDriver,
    quad: FullscreenQuad,
    lightmap: Texture2D,
    lightmap_baked: bool,
    settings: RenderSettings,
    window_size: (u32, u32),
}

impl Renderer {
    /// Compile shaders and allocate shadow targets for `directional_lights`
    /// lights. Needs a current GL context.
    pub fn new(settings: RenderSettings, directional_lights: usize, window_size: (u32, u32)) -> Result<Self, ShaderError> {
        unsafe {
            gl::Enable(gl::DEPTH_TEST);
            gl::Enable(gl::CULL_FACE);
            gl::CullFace(gl::BACK);
        }

        let scene_shader = ShaderProgram::from_sources("scene", SCENE_VERT, SCENE_FRAG)?;
        let depth_shader = ShaderProgram::from_sources("shadow depth", DEPTH_VERT, DEPTH_FRAG)?;
        let blur_shader = ShaderProgram::from_sources("vsm blur", BLUR_VERT, BLUR_FRAG)?;

        let shadow_targets = ShadowTargetSet::new(settings.shadow_algorithm, directional_lights, settings.shadow_resolution);
        if !shadow_targets.is_complete() {
            warn!("Some shadow targets are incomplete; shadows may render incorrectly");
        }
        let projection = LightProjection::new(settings.shadow_near, settings.shadow_far, settings.shadow_edge);
        info!(
            "Renderer ready: {:?} shadows, lightmap sampling {}",
            settings.shadow_algorithm,
            if settings.use_lightmap { "on" } else { "off" }
        );

        Ok(Self {
            scene_shader,
            depth_shader,
            blur_shader,
            shadow_targets,
            shadow_pass: ShadowPassDriver::new(projection),
            quad: FullscreenQuad::new(),
            lightmap: Texture2D::lightmap_placeholder(),
            lightmap_baked: false,
            settings,
            window_size,
        })
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_size = (width, height);
    }

    /// Switch algorithm or resolution; every shadow target is rebuilt.
    pub fn reallocate_shadows(&mut self, algorithm: ShadowAlgorithm, lights: usize, resolution: u32) {
        self.settings.shadow_algorithm = algorithm;
        self.settings.shadow_resolution = resolution;
        self.shadow_targets.reallocate(algorithm, lights, resolution);
        let allocated = self.shadow_targets.allocated();
        if allocated != algorithm.resources_needed(lights) || !self.shadow_targets.is_complete() {
            warn!("Shadow targets after switching to {algorithm:?}: {allocated:?}");
        }
    }

    /// Shadow pass for every directional light, then the lit scene into the
    /// window.
    pub fn draw_frame(&mut self, scene: &mut Scene, frame: &FrameContext) {
        let Scene {
            world,
            models,
            directional_lights,
            point_lights,
            ..
        } = scene;

        self.shadow_pass.run(
            &self.shadow_targets,
            directional_lights,
            ShadowPrograms {
                depth: &mut self.depth_shader,
                blur: &mut self.blur_shader,
                quad: &self.quad,
            },
            &mut |shader| draw_models(world, models, shader, false),
            self.window_size,
        );

        unsafe {
            gl::ClearColor(CLEAR_COLOR.x, CLEAR_COLOR.y, CLEAR_COLOR.z, 1.0);
            gl::Clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT);
        }
        let inputs = SceneInputs {
            directional: directional_lights,
            point: point_lights,
            frame,
            settings: &self.settings,
        };
        SceneUniformBinder::push(&mut self.scene_shader, &inputs, &self.shadow_targets, &self.lightmap);
        draw_models(world, models, &mut self.scene_shader, true);
    }

    /// Draw the scene into one hemicube face. The bake context has already
    /// bound its atlas and set the viewport.
    pub fn draw_bake_view(&mut self, scene: &Scene, view: &HemicubeView) {
        let frame = FrameContext {
            view: view.view,
            projection: view.projection,
            camera_position: view.view.inverse().w_axis.truncate(),
            blinn: false,
        };
        let settings = bake_view_settings(&self.settings, self.lightmap_baked);
        let inputs = SceneInputs {
            directional: &scene.directional_lights,
            point: &scene.point_lights,
            frame: &frame,
            settings: &settings,
        };
        SceneUniformBinder::push(&mut self.scene_shader, &inputs, &self.shadow_targets, &self.lightmap);
        unsafe {
            gl::Disable(gl::CULL_FACE);
        }
        draw_models(&scene.world, &scene.models, &mut self.scene_shader, false);
        unsafe {
            gl::Enable(gl::CULL_FACE);
        }
    }

    /// Return to the window framebuffer after offscreen work.
    pub fn restore_default_target(&self) {
        target::bind_default(self.window_size.0, self.window_size.1);
    }

    /// Replace the lightmap texture contents with a finished bake.
    pub fn upload_lightmap(&mut self, width: u32, height: u32, data: &[f32]) {
        self.lightmap.upload_rgba_f32(width, height, data);
        self.lightmap_baked = true;
        info!("Lightmap uploaded ({width}x{height})");
    }
}

/// Settings for hemicube views. A previous bake feeds its light back in, so
/// repeated bakes accumulate bounces; before the first one the ambient term
/// stands in.
fn bake_view_settings(settings: &RenderSettings, lightmap_baked: bool) -> RenderSettings {
    RenderSettings {
        use_lightmap: settings.use_lightmap && lightmap_baked,
        ..settings.clone()
    }
}

/// Draw every model instance with `shader`, setting its `model` matrix.
fn draw_models(world: &World, models: &ModelStore, shader: &mut ShaderProgram, textures: bool) {
    shader.bind();
    for (_entity, (global, handle)) in world.query::<(&GlobalTransform, &ModelHandle)>().iter() {
        shader.set_mat4("model", &global.0);
        models.get(*handle).draw(shader, textures);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hemicube_views_sample_only_a_baked_lightmap() {
        let enabled = RenderSettings {
            use_lightmap: true,
            ..RenderSettings::default()
        };
        assert!(!bake_view_settings(&enabled, false).use_lightmap);
        assert!(bake_view_settings(&enabled, true).use_lightmap);

        let disabled = RenderSettings::default();
        assert!(!disabled.use_lightmap);
        assert!(!bake_view_settings(&disabled, true).use_lightmap);

        let view = bake_view_settings(&enabled, true);
        assert_eq!(view.shadow_algorithm, enabled.shadow_algorithm);
        assert_eq!(view.shadow_resolution, enabled.shadow_resolution);
    }
}
