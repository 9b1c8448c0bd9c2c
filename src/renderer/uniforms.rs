use glam::{Mat4, Vec3};

use super::model::FIRST_SHARED_UNIT;
use super::shader::ShaderProgram;
use super::texture::Texture2D;
use crate::components::lighting::{DirectionalLight, PointLight};
use crate::config::RenderSettings;
use crate::shadow::targets::ShadowTargetSet;
use crate::shadow::ShadowAlgorithm;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Bool(bool),
    Float(f32),
    Vec3(Vec3),
    Mat4(Mat4),
}

/// Per-frame camera state.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
    pub blinn: bool,
}

/// Everything the scene shader reads besides materials and the model matrix.
pub struct SceneInputs<'a> {
    pub directional: &'a [DirectionalLight],
    pub point: &'a [PointLight],
    pub frame: &'a FrameContext,
    pub settings: &'a RenderSettings,
}

/// Texture unit of light `i`'s shadow (or filtered moment) map.
pub fn shadow_unit(light: usize) -> u32 {
    FIRST_SHARED_UNIT + light as u32
}

/// Texture unit of the lightmap, after every shadow map.
pub fn lightmap_unit(lights: usize) -> u32 {
    FIRST_SHARED_UNIT + lights as u32
}

/// Assembles the scene shader's uniforms. Holds no state between frames.
pub struct SceneUniformBinder;

impl SceneUniformBinder {
    pub fn collect(inputs: &SceneInputs<'_>) -> Vec<(String, UniformValue)> {
        use UniformValue as U;

        let settings = inputs.settings;
        let frame = inputs.frame;
        let sampler_field = match settings.shadow_algorithm {
            ShadowAlgorithm::Vsm => "d_d2_filter",
            _ => "shadowMap",
        };

        let mut uniforms: Vec<(String, UniformValue)> = vec![
            ("numDirectionalLights".into(), U::Int(inputs.directional.len() as i32)),
            ("numPointLights".into(), U::Int(inputs.point.len() as i32)),
        ];

        for (i, light) in inputs.directional.iter().enumerate() {
            let field = |name: &str| format!("directionalLights[{i}].{name}");
            uniforms.extend([
                (field("direction"), U::Vec3(light.direction())),
                (field("ambient"), U::Vec3(light.ambient)),
                (field("diffuse"), U::Vec3(light.diffuse)),
                (field("specular"), U::Vec3(light.specular)),
                (field("lightColor"), U::Vec3(light.light_color)),
                (field("lightSpaceMatrix"), U::Mat4(light.light_space_matrix)),
                (field(sampler_field), U::Int(shadow_unit(i) as i32)),
            ]);
        }

        for (i, light) in inputs.point.iter().enumerate() {
            let field = |name: &str| format!("pointLights[{i}].{name}");
            uniforms.extend([
                (field("position"), U::Vec3(light.position)),
                (field("ambient"), U::Vec3(light.ambient)),
                (field("diffuse"), U::Vec3(light.diffuse)),
                (field("specular"), U::Vec3(light.specular)),
                (field("constant"), U::Float(light.constant)),
                (field("linear"), U::Float(light.linear)),
                (field("quadratic"), U::Float(light.quadratic)),
                (field("lightColor"), U::Vec3(light.light_color)),
            ]);
        }

        uniforms.extend([
            ("blinn".into(), U::Bool(frame.blinn)),
            ("useLightMap".into(), U::Bool(settings.use_lightmap)),
            ("lightMap".into(), U::Int(lightmap_unit(inputs.directional.len()) as i32)),
            ("projection".into(), U::Mat4(frame.projection)),
            ("view".into(), U::Mat4(frame.view)),
            ("viewPos".into(), U::Vec3(frame.camera_position)),
            ("lightWidth".into(), U::Float(settings.light_width)),
            ("PCFSampleRadius".into(), U::Float(settings.pcf_sample_radius)),
            ("shadowMapType".into(), U::Int(settings.shadow_algorithm.selector())),
            ("near_plane".into(), U::Float(settings.shadow_near)),
            ("far_plane".into(), U::Float(settings.shadow_far)),
        ]);
        uniforms
    }

    /// Bind `shader`, set every collected uniform and bind the shadow maps
    /// and lightmap to the units the sampler uniforms name.
    pub fn push(shader: &mut ShaderProgram, inputs: &SceneInputs<'_>, targets: &ShadowTargetSet, lightmap: &Texture2D) {
        shader.bind();
        for (name, value) in Self::collect(inputs) {
            shader.set(&name, &value);
        }
        for i in 0..inputs.directional.len() {
            if let Some(texture) = targets.get(i).and_then(|t| t.sampled_texture()) {
                texture.bind(shadow_unit(i));
            }
        }
        lightmap.bind(lightmap_unit(inputs.directional.len()));
        unsafe {
            gl::ActiveTexture(gl::TEXTURE0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(uniforms: &'a [(String, UniformValue)], name: &str) -> Option<&'a UniformValue> {
        uniforms.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    fn frame() -> FrameContext {
        FrameContext {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            camera_position: Vec3::new(0.0, 1.0, 3.0),
            blinn: true,
        }
    }

    fn sun() -> DirectionalLight {
        DirectionalLight::new(Vec3::new(-0.2, -1.0, -0.3), Vec3::splat(0.05), Vec3::splat(0.4), Vec3::splat(0.5), Vec3::ONE)
    }

    fn lamp() -> PointLight {
        PointLight {
            position: Vec3::new(0.7, 0.2, 2.0),
            ambient: Vec3::splat(0.05),
            diffuse: Vec3::splat(0.8),
            specular: Vec3::ONE,
            light_color: Vec3::ONE,
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        }
    }

    #[test]
    fn depth_algorithms_bind_shadow_map_samplers() {
        let settings = RenderSettings::default();
        let frame = frame();
        let lights = [sun(), sun()];
        let points = [lamp()];
        let uniforms = SceneUniformBinder::collect(&SceneInputs {
            directional: &lights,
            point: &points,
            frame: &frame,
            settings: &settings,
        });

        assert_eq!(lookup(&uniforms, "numDirectionalLights"), Some(&UniformValue::Int(2)));
        assert_eq!(lookup(&uniforms, "numPointLights"), Some(&UniformValue::Int(1)));
        assert_eq!(lookup(&uniforms, "shadowMapType"), Some(&UniformValue::Int(1)));
        assert_eq!(lookup(&uniforms, "directionalLights[1].shadowMap"), Some(&UniformValue::Int(3)));
        assert_eq!(lookup(&uniforms, "lightMap"), Some(&UniformValue::Int(4)));
        assert_eq!(lookup(&uniforms, "pointLights[0].quadratic"), Some(&UniformValue::Float(0.032)));
        assert_eq!(lookup(&uniforms, "lightWidth"), Some(&UniformValue::Float(0.132)));
        assert_eq!(lookup(&uniforms, "PCFSampleRadius"), Some(&UniformValue::Float(0.588)));
        assert_eq!(lookup(&uniforms, "near_plane"), Some(&UniformValue::Float(2.0)));
        assert_eq!(lookup(&uniforms, "far_plane"), Some(&UniformValue::Float(120.0)));
        assert_eq!(lookup(&uniforms, "blinn"), Some(&UniformValue::Bool(true)));
        assert_eq!(lookup(&uniforms, "useLightMap"), Some(&UniformValue::Bool(false)));
        assert!(lookup(&uniforms, "directionalLights[0].d_d2_filter").is_none());
    }

    #[test]
    fn variance_binds_filtered_moments() {
        let settings = RenderSettings {
            shadow_algorithm: ShadowAlgorithm::Vsm,
            use_lightmap: true,
            ..RenderSettings::default()
        };
        let frame = frame();
        let lights = [sun()];
        let uniforms = SceneUniformBinder::collect(&SceneInputs {
            directional: &lights,
            point: &[],
            frame: &frame,
            settings: &settings,
        });

        assert_eq!(lookup(&uniforms, "shadowMapType"), Some(&UniformValue::Int(3)));
        assert_eq!(lookup(&uniforms, "directionalLights[0].d_d2_filter"), Some(&UniformValue::Int(2)));
        assert!(lookup(&uniforms, "directionalLights[0].shadowMap").is_none());
        assert_eq!(lookup(&uniforms, "useLightMap"), Some(&UniformValue::Bool(true)));
        assert_eq!(
            lookup(&uniforms, "directionalLights[0].lightSpaceMatrix"),
            Some(&UniformValue::Mat4(lights[0].light_space_matrix))
        );
    }
}
