use glam::Mat4;
use log::trace;

use super::targets::ShadowTargetSet;
use super::transform::LightProjection;
use super::{BlurAxis, DepthPass, FilterPass};
use crate::components::lighting::DirectionalLight;
use crate::fsm::StateMachine;
use crate::renderer::mesh::FullscreenQuad;
use crate::renderer::shader::ShaderProgram;
use crate::renderer::target::bind_default;

/// Where the shadow pass is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowPhase {
    Idle,
    DepthPass(usize),
    FilterHorizontal(usize),
    FilterVertical(usize),
    Done,
}

/// Phase following `phase` for `lights` shadow-casting lights. `filtered`
/// inserts the two blur passes after every depth pass.
pub fn next_phase(phase: ShadowPhase, lights: usize, filtered: bool) -> ShadowPhase {
    let after_light = |i: usize| {
        if i + 1 < lights {
            ShadowPhase::DepthPass(i + 1)
        } else {
            ShadowPhase::Done
        }
    };
    match phase {
        ShadowPhase::Idle if lights == 0 => ShadowPhase::Done,
        ShadowPhase::Idle => ShadowPhase::DepthPass(0),
        ShadowPhase::DepthPass(i) if filtered => ShadowPhase::FilterHorizontal(i),
        ShadowPhase::DepthPass(i) => after_light(i),
        ShadowPhase::FilterHorizontal(i) => ShadowPhase::FilterVertical(i),
        ShadowPhase::FilterVertical(i) => after_light(i),
        ShadowPhase::Done => ShadowPhase::Done,
    }
}

/// Shaders and geometry the shadow pass draws with.
pub struct ShadowPrograms<'a> {
    pub depth: &'a mut ShaderProgram,
    pub blur: &'a mut ShaderProgram,
    pub quad: &'a FullscreenQuad,
}

/// Runs every light's depth pass (and VSM blur) once per frame.
pub struct ShadowPassDriver {
    fsm: StateMachine<ShadowPhase>,
    projection: LightProjection,
}

impl ShadowPassDriver {
    pub fn new(projection: LightProjection) -> Self {
        Self {
            fsm: StateMachine::new(ShadowPhase::Idle),
            projection,
        }
    }

    /// Refresh every light's light-space matrix.
    pub fn update_light_matrices(&self, lights: &mut [DirectionalLight]) {
        for light in lights.iter_mut() {
            light.light_space_matrix = self.projection.light_space_matrix(light.direction());
        }
    }

    /// Render all shadow maps. `draw_scene` draws every model with whatever
    /// shader it is handed, without material textures. Leaves the default
    /// framebuffer bound with a `window` sized viewport and back-face culling.
    pub fn run(
        &mut self,
        targets: &ShadowTargetSet,
        lights: &mut [DirectionalLight],
        programs: ShadowPrograms<'_>,
        draw_scene: &mut dyn FnMut(&mut ShaderProgram),
        window: (u32, u32),
    ) {
        self.update_light_matrices(lights);

        let algorithm = targets.algorithm();
        let technique = algorithm.technique();
        let filtered = algorithm.resources_needed(1).has_filter_passes();
        let count = lights.len().min(targets.targets().len());
        let resolution = targets.resolution() as i32;

        unsafe {
            gl::CullFace(gl::FRONT);
            gl::Viewport(0, 0, resolution, resolution);
        }

        self.fsm.reset();
        loop {
            let next = next_phase(self.fsm.state, count, filtered);
            self.fsm.force_go(next);
            trace!("shadow phase {:?} -> {:?}", self.fsm.previous, self.fsm.state);
            match self.fsm.state {
                ShadowPhase::DepthPass(i) => {
                    let light_space_matrix: Mat4 = lights[i].light_space_matrix;
                    technique.run_depth_pass(DepthPass {
                        target: &targets.targets()[i],
                        light_space_matrix,
                        shader: &mut *programs.depth,
                        draw_scene: &mut *draw_scene,
                    });
                }
                ShadowPhase::FilterHorizontal(i) | ShadowPhase::FilterVertical(i) => {
                    let axis = if matches!(self.fsm.state, ShadowPhase::FilterHorizontal(_)) {
                        BlurAxis::Horizontal
                    } else {
                        BlurAxis::Vertical
                    };
                    technique.run_filter_pass(FilterPass {
                        target: &targets.targets()[i],
                        axis,
                        shader: &mut *programs.blur,
                        quad: programs.quad,
                    });
                }
                ShadowPhase::Idle | ShadowPhase::Done => break,
            }
        }

        bind_default(window.0, window.1);
        unsafe {
            gl::CullFace(gl::BACK);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ShadowPhase::*;

    fn schedule(lights: usize, filtered: bool) -> Vec<ShadowPhase> {
        let mut phases = Vec::new();
        let mut phase = Idle;
        loop {
            phase = next_phase(phase, lights, filtered);
            if phase == Done {
                return phases;
            }
            phases.push(phase);
        }
    }

    #[test]
    fn depth_only_visits_each_light_once() {
        assert_eq!(schedule(3, false), vec![DepthPass(0), DepthPass(1), DepthPass(2)]);
    }

    #[test]
    fn variance_blurs_after_every_depth_pass() {
        assert_eq!(
            schedule(2, true),
            vec![
                DepthPass(0),
                FilterHorizontal(0),
                FilterVertical(0),
                DepthPass(1),
                FilterHorizontal(1),
                FilterVertical(1),
            ]
        );
    }

    #[test]
    fn no_lights_goes_straight_to_done() {
        assert!(schedule(0, true).is_empty());
        assert_eq!(next_phase(Done, 4, false), Done);
    }

    #[test]
    fn driver_refreshes_light_matrices() {
        use glam::Vec3;

        let projection = LightProjection::new(2.0, 120.0, 120.0);
        let driver = ShadowPassDriver::new(projection);
        let direction = Vec3::new(-0.2, -1.0, 0.3);
        let mut lights = vec![DirectionalLight::new(direction, Vec3::ZERO, Vec3::ONE, Vec3::ONE, Vec3::ONE)];
        driver.update_light_matrices(&mut lights);
        assert_eq!(
            lights[0].light_space_matrix,
            projection.light_space_matrix(direction)
        );
    }
}
