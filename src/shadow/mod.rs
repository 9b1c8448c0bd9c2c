//! Directional-light shadows.
//!
//! Every algorithm renders one depth map per directional light. Variance
//! shadow mapping additionally writes depth moments and blurs them with a
//! separable filter before the scene shader samples them.

pub mod pass;
pub mod targets;
pub mod transform;

use clap::ValueEnum;
use glam::Mat4;

use crate::renderer::mesh::FullscreenQuad;
use crate::renderer::shader::ShaderProgram;
use targets::ShadowTarget;

/// Shadow algorithm used for every directional light, chosen at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShadowAlgorithm {
    /// Single depth comparison.
    Hard,
    /// Percentage-closer filtering.
    Pcf,
    /// Percentage-closer soft shadows.
    Pcss,
    /// Variance shadow mapping.
    Vsm,
}

impl ShadowAlgorithm {
    /// Value of the `shadowMapType` uniform.
    pub fn selector(self) -> i32 {
        match self {
            Self::Hard => 0,
            Self::Pcf => 1,
            Self::Pcss => 2,
            Self::Vsm => 3,
        }
    }

    pub fn technique(self) -> &'static dyn ShadowTechnique {
        match self {
            Self::Hard | Self::Pcf | Self::Pcss => &DepthOnly,
            Self::Vsm => &Variance,
        }
    }

    pub fn resources_needed(self, lights: usize) -> ShadowResources {
        self.technique().resources_needed(lights)
    }

    /// Following algorithm in selector order, wrapping around.
    pub fn next(self) -> Self {
        match self {
            Self::Hard => Self::Pcf,
            Self::Pcf => Self::Pcss,
            Self::Pcss => Self::Vsm,
            Self::Vsm => Self::Hard,
        }
    }
}

/// Render targets an algorithm needs for a given number of lights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShadowResources {
    pub depth_targets: usize,
    pub moment_targets: usize,
    pub filter_targets: usize,
}

impl ShadowResources {
    pub fn has_filter_passes(&self) -> bool {
        self.filter_targets > 0
    }
}

/// Blur direction of one separable filter pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurAxis {
    Horizontal,
    Vertical,
}

/// Everything a depth pass needs for one light.
pub struct DepthPass<'a> {
    pub target: &'a ShadowTarget,
    pub light_space_matrix: Mat4,
    pub shader: &'a mut ShaderProgram,
    pub draw_scene: &'a mut dyn FnMut(&mut ShaderProgram),
}

/// Everything a filter pass needs for one light.
pub struct FilterPass<'a> {
    pub target: &'a ShadowTarget,
    pub axis: BlurAxis,
    pub shader: &'a mut ShaderProgram,
    pub quad: &'a FullscreenQuad,
}

/// Per-algorithm behaviour of the shadow pass.
pub trait ShadowTechnique {
    fn resources_needed(&self, lights: usize) -> ShadowResources;

    /// Clear and render the scene's depth from the light.
    fn run_depth_pass(&self, pass: DepthPass<'_>);

    /// One blur pass over the light's moments. No-op for depth-only algorithms.
    fn run_filter_pass(&self, _pass: FilterPass<'_>) {}
}

/// Hard, PCF and PCSS: a depth attachment and nothing else.
pub struct DepthOnly;

impl ShadowTechnique for DepthOnly {
    fn resources_needed(&self, lights: usize) -> ShadowResources {
        ShadowResources {
            depth_targets: lights,
            ..ShadowResources::default()
        }
    }

    fn run_depth_pass(&self, pass: DepthPass<'_>) {
        pass.target.depth.bind();
        unsafe {
            gl::Clear(gl::DEPTH_BUFFER_BIT);
        }
        draw_depth(pass);
    }
}

/// Variance shadow mapping: depth plus moments, then a two-pass blur.
pub struct Variance;

/// Moments of a texel nothing was drawn to: depth 1, depth² 1.
const MOMENT_CLEAR: [f32; 4] = [1.0, 1.0, 0.0, 1.0];

impl ShadowTechnique for Variance {
    fn resources_needed(&self, lights: usize) -> ShadowResources {
        ShadowResources {
            depth_targets: lights,
            moment_targets: lights,
            filter_targets: lights * 2,
        }
    }

    fn run_depth_pass(&self, pass: DepthPass<'_>) {
        pass.target.depth.bind();
        unsafe {
            let [r, g, b, a] = MOMENT_CLEAR;
            gl::ClearColor(r, g, b, a);
            gl::Clear(gl::DEPTH_BUFFER_BIT | gl::COLOR_BUFFER_BIT);
        }
        draw_depth(pass);
    }

    fn run_filter_pass(&self, pass: FilterPass<'_>) {
        let Some([horizontal, vertical]) = pass.target.filters.as_ref() else {
            return;
        };
        let (output, input) = match pass.axis {
            BlurAxis::Horizontal => (horizontal, pass.target.depth.color()),
            BlurAxis::Vertical => (vertical, horizontal.color()),
        };
        let Some(input) = input else {
            return;
        };

        output.bind();
        unsafe {
            gl::ClearColor(0.0, 0.0, 0.0, 1.0);
            gl::Clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT);
        }
        pass.shader.bind();
        pass.shader.set_bool("vertical", pass.axis == BlurAxis::Vertical);
        pass.shader.set_int("d_d2", 0);
        input.bind(0);
        // The depth pass leaves front faces culled, which would drop the quad.
        unsafe {
            gl::Disable(gl::CULL_FACE);
        }
        pass.quad.draw();
        unsafe {
            gl::Enable(gl::CULL_FACE);
        }
    }
}

fn draw_depth(pass: DepthPass<'_>) {
    pass.shader.bind();
    pass.shader.set_mat4("lightSpaceMatrix", &pass.light_space_matrix);
    (pass.draw_scene)(pass.shader);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_match_shader_contract() {
        assert_eq!(ShadowAlgorithm::Hard.selector(), 0);
        assert_eq!(ShadowAlgorithm::Pcf.selector(), 1);
        assert_eq!(ShadowAlgorithm::Pcss.selector(), 2);
        assert_eq!(ShadowAlgorithm::Vsm.selector(), 3);
    }

    #[test]
    fn only_variance_allocates_moments_and_filters() {
        for n in 0..5 {
            for algorithm in [ShadowAlgorithm::Hard, ShadowAlgorithm::Pcf, ShadowAlgorithm::Pcss] {
                let r = algorithm.resources_needed(n);
                assert_eq!(r.depth_targets, n);
                assert_eq!(r.moment_targets, 0);
                assert_eq!(r.filter_targets, 0);
                assert!(!r.has_filter_passes());
            }
            let r = ShadowAlgorithm::Vsm.resources_needed(n);
            assert_eq!(r.depth_targets, n);
            assert_eq!(r.moment_targets, n);
            assert_eq!(r.filter_targets, 2 * n);
        }
    }

    #[test]
    fn next_cycles_through_every_selector() {
        let mut algorithm = ShadowAlgorithm::Hard;
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(algorithm.selector());
            algorithm = algorithm.next();
        }
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert_eq!(algorithm, ShadowAlgorithm::Hard);
    }

    #[test]
    fn single_light_plan() {
        let r = ShadowAlgorithm::Pcf.resources_needed(1);
        assert_eq!(
            r,
            ShadowResources {
                depth_targets: 1,
                moment_targets: 0,
                filter_targets: 0
            }
        );
    }
}
