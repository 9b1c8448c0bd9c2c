use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec3;
use log::error;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::components::lighting::{DirectionalLight, PointLight};
use crate::components::{LocalTransform, Spin};

pub const SCENE_FILE: &str = "scene.yaml";
pub const DIRECTIONAL_LIGHTS_FILE: &str = "directionalLights.yaml";
pub const POINT_LIGHTS_FILE: &str = "pointLights.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// `{x, y, z}` map as written in the YAML files.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Xyz {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Xyz> for Vec3 {
    fn from(v: Xyz) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

fn zero() -> Xyz {
    Xyz { x: 0.0, y: 0.0, z: 0.0 }
}

fn one() -> Xyz {
    Xyz { x: 1.0, y: 1.0, z: 1.0 }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SpinConfig {
    /// Axial tilt about Z, degrees.
    pub tilt: f32,
    /// Spin about the tilted Y axis, degrees per second.
    pub speed: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelInstanceConfig {
    pub path: PathBuf,
    pub position: Xyz,
    #[serde(default = "zero")]
    pub rotation: Xyz,
    #[serde(default = "one")]
    pub scale: Xyz,
    #[serde(default)]
    pub spin: Option<SpinConfig>,
}

impl ModelInstanceConfig {
    pub fn local_transform(&self) -> LocalTransform {
        LocalTransform {
            position: self.position.into(),
            rotation: self.rotation.into(),
            scale: self.scale.into(),
        }
    }

    pub fn spin(&self) -> Option<Spin> {
        self.spin.map(|s| Spin {
            tilt_degrees: s.tilt,
            degrees_per_second: s.speed,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectionalLightConfig {
    direction: Xyz,
    ambient: Xyz,
    diffuse: Xyz,
    specular: Xyz,
    light_color: Xyz,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointLightConfig {
    position: Xyz,
    constant: f32,
    linear: f32,
    quadratic: f32,
    ambient: Xyz,
    diffuse: Xyz,
    specular: Xyz,
    light_color: Xyz,
}

#[derive(Debug, Default, Deserialize)]
struct SceneFile {
    #[serde(default)]
    models: Vec<ModelInstanceConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectionalLightsFile {
    #[serde(default)]
    directional_lights: Vec<DirectionalLightConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointLightsFile {
    #[serde(default)]
    point_lights: Vec<PointLightConfig>,
}

/// Read and parse one YAML file. An empty file parses as the default value.
fn read_yaml<T: DeserializeOwned + Default>(path: &Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if text.trim().is_empty() {
        return Ok(T::default());
    }
    serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_scene(path: &Path) -> Result<Vec<ModelInstanceConfig>, ConfigError> {
    Ok(read_yaml::<SceneFile>(path)?.models)
}

pub fn load_directional_lights(path: &Path) -> Result<Vec<DirectionalLight>, ConfigError> {
    let file: DirectionalLightsFile = read_yaml(path)?;
    Ok(file
        .directional_lights
        .into_iter()
        .map(|l| {
            DirectionalLight::new(
                l.direction.into(),
                l.ambient.into(),
                l.diffuse.into(),
                l.specular.into(),
                l.light_color.into(),
            )
        })
        .collect())
}

pub fn load_point_lights(path: &Path) -> Result<Vec<PointLight>, ConfigError> {
    let file: PointLightsFile = read_yaml(path)?;
    Ok(file
        .point_lights
        .into_iter()
        .map(|l| PointLight {
            position: l.position.into(),
            ambient: l.ambient.into(),
            diffuse: l.diffuse.into(),
            specular: l.specular.into(),
            light_color: l.light_color.into(),
            constant: l.constant,
            linear: l.linear,
            quadratic: l.quadratic,
        })
        .collect())
}

/// Log a failed load and continue with nothing from that file.
pub fn recover_or_empty<T>(result: Result<Vec<T>, ConfigError>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        error!("{e}; continuing with an empty list");
        Vec::new()
    })
}
