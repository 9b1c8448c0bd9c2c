use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use glam::Vec3;

use crate::lightmap::{BakeSettings, HemicubeSettings};
use crate::shadow::ShadowAlgorithm;

pub const DEFAULT_SCREEN_WIDTH: u32 = 800;
pub const DEFAULT_SCREEN_HEIGHT: u32 = 600;

/// Shadow maps are square; 1024 matches the lightmap default.
pub const DEFAULT_SHADOW_RESOLUTION: u32 = 1024;
/// Nearest distance covered by a directional shadow map.
pub const SHADOW_NEAR_PLANE: f32 = 2.0;
/// Farthest distance covered by a directional shadow map.
pub const SHADOW_FAR_PLANE: f32 = 120.0;
/// Half extent (world units) of the orthographic shadow frustum.
pub const SHADOW_EDGE: f32 = 120.0;

/// Light width used by PCSS: larger means softer penumbrae.
pub const LIGHT_WIDTH: f32 = 0.132;
pub const PCF_SAMPLE_RADIUS: f32 = 0.588;

/// Per-frame step applied to light 0's direction while an arrow key is held.
pub const LIGHT_NUDGE_STEP: f32 = 0.01;

pub const DEFAULT_LIGHTMAP_SIZE: u32 = 1024;
pub const DEFAULT_HEMICUBE_RESOLUTION: u32 = 512;
pub const DEFAULT_BAKE_OUTPUT: &str = "result.tga";

#[derive(Parser, Debug)]
#[command(name = "penumbra", about = "Shadow mapping and hemicube lightmap baking")]
pub struct Args {
    /// Directory holding scene.yaml, directionalLights.yaml and pointLights.yaml
    #[arg(long, default_value = "config")]
    pub config_dir: PathBuf,

    /// Shadow algorithm used for every directional light
    #[arg(long, value_enum, default_value_t = ShadowAlgorithm::Pcf)]
    pub shadow_algorithm: ShadowAlgorithm,

    #[arg(long, default_value_t = DEFAULT_SHADOW_RESOLUTION)]
    pub shadow_resolution: u32,

    /// Enable lightmap baking (Space) and sample the lightmap while shading
    #[arg(long)]
    pub bake: bool,

    #[arg(long, default_value_t = DEFAULT_LIGHTMAP_SIZE)]
    pub lightmap_width: u32,

    #[arg(long, default_value_t = DEFAULT_LIGHTMAP_SIZE)]
    pub lightmap_height: u32,

    #[arg(long, default_value_t = DEFAULT_HEMICUBE_RESOLUTION)]
    pub hemicube_resolution: u32,

    #[arg(long, default_value = DEFAULT_BAKE_OUTPUT)]
    pub bake_output: PathBuf,

    /// Spread a bake over frames, spending at most this many milliseconds per
    /// frame. Without it a bake blocks until finished.
    #[arg(long)]
    pub bake_budget_ms: Option<u64>,

    #[arg(long, default_value_t = DEFAULT_SCREEN_WIDTH)]
    pub width: u32,

    #[arg(long, default_value_t = DEFAULT_SCREEN_HEIGHT)]
    pub height: u32,
}

/// Startup-time choices consumed by the renderer and the uniform binder.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub shadow_algorithm: ShadowAlgorithm,
    pub shadow_resolution: u32,
    pub shadow_near: f32,
    pub shadow_far: f32,
    pub shadow_edge: f32,
    pub light_width: f32,
    pub pcf_sample_radius: f32,
    pub use_lightmap: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            shadow_algorithm: ShadowAlgorithm::Pcf,
            shadow_resolution: DEFAULT_SHADOW_RESOLUTION,
            shadow_near: SHADOW_NEAR_PLANE,
            shadow_far: SHADOW_FAR_PLANE,
            shadow_edge: SHADOW_EDGE,
            light_width: LIGHT_WIDTH,
            pcf_sample_radius: PCF_SAMPLE_RADIUS,
            use_lightmap: false,
        }
    }
}

impl Args {
    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            shadow_algorithm: self.shadow_algorithm,
            shadow_resolution: self.shadow_resolution,
            use_lightmap: self.bake,
            ..RenderSettings::default()
        }
    }

    pub fn bake_settings(&self) -> BakeSettings {
        BakeSettings {
            width: self.lightmap_width,
            height: self.lightmap_height,
            output_path: self.bake_output.clone(),
            hemicube: HemicubeSettings {
                resolution: self.hemicube_resolution,
                ..HemicubeSettings::default()
            },
        }
    }

    pub fn bake_budget(&self) -> Option<Duration> {
        self.bake_budget_ms.map(Duration::from_millis)
    }
}

/// Sky colour seen by hemicube cameras when a ray escapes the scene.
pub const BAKE_SKY_COLOR: Vec3 = Vec3::ONE;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_scene() {
        let args = Args::parse_from(["penumbra"]);
        let settings = args.render_settings();
        assert_eq!(settings.shadow_algorithm, ShadowAlgorithm::Pcf);
        assert_eq!(settings.shadow_resolution, 1024);
        assert!(!settings.use_lightmap);
        assert!(args.bake_budget().is_none());

        let bake = args.bake_settings();
        assert_eq!((bake.width, bake.height), (1024, 1024));
        assert_eq!(bake.hemicube.resolution, 512);
        assert_eq!(bake.output_path, PathBuf::from("result.tga"));
    }

    #[test]
    fn bake_flag_enables_lightmap_sampling() {
        let args = Args::parse_from([
            "penumbra",
            "--bake",
            "--shadow-algorithm",
            "vsm",
            "--bake-budget-ms",
            "8",
        ]);
        let settings = args.render_settings();
        assert!(settings.use_lightmap);
        assert_eq!(settings.shadow_algorithm, ShadowAlgorithm::Vsm);
        assert_eq!(args.bake_budget(), Some(Duration::from_millis(8)));
    }
}
