pub mod config;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use hecs::World;
use log::{error, info, warn};

use crate::components::lighting::{DirectionalLight, PointLight};
use crate::components::{instance_matrix, GlobalTransform, ModelHandle};
use crate::lightmap::geometry::BakeGeometry;
use crate::renderer::model::{load_model_data, Model, ModelStore};
use config::{
    load_directional_lights, load_point_lights, load_scene, recover_or_empty, ModelInstanceConfig,
    DIRECTIONAL_LIGHTS_FILE, POINT_LIGHTS_FILE, SCENE_FILE,
};

/// Array sizes declared by the scene shader.
pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;
pub const MAX_POINT_LIGHTS: usize = 8;

/// Contents of the three YAML files, before anything touches the GPU.
#[derive(Debug, Default)]
pub struct SceneDescription {
    pub models: Vec<ModelInstanceConfig>,
    pub directional_lights: Vec<DirectionalLight>,
    pub point_lights: Vec<PointLight>,
}

impl SceneDescription {
    /// Load every file under `config_dir`. A file that fails to load
    /// contributes nothing; the failure is logged.
    pub fn load(config_dir: &Path) -> Self {
        let mut directional_lights = recover_or_empty(load_directional_lights(&config_dir.join(DIRECTIONAL_LIGHTS_FILE)));
        let mut point_lights = recover_or_empty(load_point_lights(&config_dir.join(POINT_LIGHTS_FILE)));
        let models = recover_or_empty(load_scene(&config_dir.join(SCENE_FILE)));

        cap("directional", &mut directional_lights, MAX_DIRECTIONAL_LIGHTS);
        cap("point", &mut point_lights, MAX_POINT_LIGHTS);
        info!(
            "Scene config: {} models, {} directional lights, {} point lights",
            models.len(),
            directional_lights.len(),
            point_lights.len()
        );
        Self {
            models,
            directional_lights,
            point_lights,
        }
    }
}

fn cap<T>(kind: &str, lights: &mut Vec<T>, max: usize) {
    if lights.len() > max {
        warn!("{} {kind} lights configured, only the first {max} are used", lights.len());
        lights.truncate(max);
    }
}

/// Everything that gets drawn: model instances as hecs entities, their GPU
/// models, the lights and the flattened geometry the baker reads.
pub struct Scene {
    pub world: World,
    pub models: ModelStore,
    pub directional_lights: Vec<DirectionalLight>,
    pub point_lights: Vec<PointLight>,
    pub bake_geometry: BakeGeometry,
    /// Whether spinning instances animate. Off while baking is enabled so the
    /// lightmap keeps matching the geometry.
    pub animate: bool,
}

impl Scene {
    /// Load models and spawn one entity per configured instance. Each model
    /// file is read and uploaded once however many instances use it.
    pub fn build(description: SceneDescription, animate: bool) -> Self {
        let mut world = World::new();
        let mut models = ModelStore::new();
        let mut bake_geometry = BakeGeometry::new();
        let mut loaded: HashMap<PathBuf, Option<(ModelHandle, usize)>> = HashMap::new();
        let mut data_by_handle = Vec::new();

        for instance in &description.models {
            let entry = loaded.entry(instance.path.clone()).or_insert_with(|| match load_model_data(&instance.path) {
                Ok(data) => {
                    let handle = models.add(Model::upload(&data));
                    data_by_handle.push(data);
                    Some((handle, data_by_handle.len() - 1))
                }
                Err(e) => {
                    error!("{e}");
                    None
                }
            });
            let Some((handle, data_index)) = *entry else {
                continue;
            };

            let local = instance.local_transform();
            let spin = instance.spin();
            let global = instance_matrix(&local, spin.as_ref(), 0.0, animate);
            let bake_matrix = instance_matrix(&local, spin.as_ref(), 0.0, false);
            for mesh in &data_by_handle[data_index].meshes {
                bake_geometry.append(mesh, &bake_matrix);
            }

            match spin {
                Some(spin) => world.spawn((local, GlobalTransform(global), handle, spin)),
                None => world.spawn((local, GlobalTransform(global), handle)),
            };
        }

        info!(
            "Scene built: {} instances, {} bake triangles",
            world.len(),
            bake_geometry.triangle_count()
        );
        Self {
            world,
            models,
            directional_lights: description.directional_lights,
            point_lights: description.point_lights,
            bake_geometry,
            animate,
        }
    }

    pub fn load(config_dir: &Path, animate: bool) -> Self {
        Self::build(SceneDescription::load(config_dir), animate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_config_dir_gives_an_empty_description() {
        let dir = tempfile::tempdir().unwrap();
        let description = SceneDescription::load(&dir.path().join("absent"));
        assert!(description.models.is_empty());
        assert!(description.directional_lights.is_empty());
        assert!(description.point_lights.is_empty());
    }

    #[test]
    fn one_bad_file_does_not_drop_the_others() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(DIRECTIONAL_LIGHTS_FILE),
            "directionalLights:\n  - direction: {x: 0, y: -1, z: 0}\n    ambient: {x: 0, y: 0, z: 0}\n    diffuse: {x: 1, y: 1, z: 1}\n    specular: {x: 1, y: 1, z: 1}\n    lightColor: {x: 1, y: 1, z: 1}\n",
        )
        .unwrap();
        fs::write(dir.path().join(POINT_LIGHTS_FILE), "pointLights: [{position: oops").unwrap();

        let description = SceneDescription::load(dir.path());
        assert_eq!(description.directional_lights.len(), 1);
        assert!(description.point_lights.is_empty());
        assert!(description.models.is_empty());
    }

    #[test]
    fn extra_lights_are_dropped() {
        let mut lights: Vec<u8> = (0..10).collect();
        cap("point", &mut lights, MAX_POINT_LIGHTS);
        assert_eq!(lights.len(), 8);
    }
}
