use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use glam::Vec3;
use log::{info, warn};
use thiserror::Error;

use super::mesh::Mesh;
use super::shader::ShaderProgram;
use super::texture::Texture2D;
use crate::components::ModelHandle;

/// Texture unit of a material's diffuse map.
pub const DIFFUSE_MAP_UNIT: u32 = 0;
/// Texture unit of a material's specular map.
pub const SPECULAR_MAP_UNIT: u32 = 1;
/// First unit free for non-material textures (shadow maps, lightmap).
pub const FIRST_SHARED_UNIT: u32 = 2;

/// MTL files rarely carry a usable Ns; this is the exponent used when absent.
const DEFAULT_SHININESS: f32 = 108.0;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to load model {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },
}

/// CPU-side triangle mesh: parallel attribute arrays plus u32 indices.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    pub material: MaterialData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialData {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    pub diffuse_map: Option<PathBuf>,
    pub specular_map: Option<PathBuf>,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            ambient: Vec3::ONE,
            diffuse: Vec3::ONE,
            specular: Vec3::splat(0.5),
            shininess: DEFAULT_SHININESS,
            diffuse_map: None,
            specular_map: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelData {
    pub path: PathBuf,
    pub meshes: Vec<MeshData>,
}

impl ModelData {
    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.positions.len()).sum()
    }

    pub fn index_count(&self) -> usize {
        self.meshes.iter().map(|m| m.indices.len()).sum()
    }
}

/// Parse an OBJ (and its MTL, if any) into CPU mesh data.
/// UVs are flipped vertically so image rows map to GL texture rows.
pub fn load_model_data(path: &Path) -> Result<ModelData, ModelError> {
    let (models, materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|source| ModelError::Load {
        path: path.to_path_buf(),
        source,
    })?;

    let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let materials = materials.unwrap_or_else(|e| {
        warn!("Materials for {} unavailable: {e}", path.display());
        Vec::new()
    });

    let meshes = models
        .into_iter()
        .map(|model| {
            let mesh = model.mesh;
            let material = mesh
                .material_id
                .and_then(|id| materials.get(id))
                .map(|m| material_from_mtl(m, &directory))
                .unwrap_or_default();
            MeshData {
                positions: mesh.positions.chunks_exact(3).map(|p| [p[0], p[1], p[2]]).collect(),
                normals: mesh.normals.chunks_exact(3).map(|n| [n[0], n[1], n[2]]).collect(),
                uvs: mesh.texcoords.chunks_exact(2).map(|t| [t[0], 1.0 - t[1]]).collect(),
                indices: mesh.indices,
                material,
            }
        })
        .collect();

    Ok(ModelData {
        path: path.to_path_buf(),
        meshes,
    })
}

fn material_from_mtl(mtl: &tobj::Material, directory: &Path) -> MaterialData {
    let defaults = MaterialData::default();
    MaterialData {
        ambient: mtl.ambient.map(Vec3::from).unwrap_or(defaults.ambient),
        diffuse: mtl.diffuse.map(Vec3::from).unwrap_or(defaults.diffuse),
        specular: mtl.specular.map(Vec3::from).unwrap_or(defaults.specular),
        shininess: mtl.shininess.filter(|s| *s > 0.0).unwrap_or(defaults.shininess),
        diffuse_map: mtl.diffuse_texture.as_ref().map(|t| directory.join(t)),
        specular_map: mtl.specular_texture.as_ref().map(|t| directory.join(t)),
    }
}

struct Material {
    ambient: Vec3,
    diffuse: Vec3,
    specular: Vec3,
    shininess: f32,
    diffuse_map: Option<Rc<Texture2D>>,
    specular_map: Option<Rc<Texture2D>>,
}

impl Material {
    /// Set the material uniforms. With `textures = false` the maps are left
    /// unbound and the shader is told not to sample them.
    fn bind(&self, shader: &mut ShaderProgram, textures: bool) {
        shader.set_vec3("material.ambient", self.ambient);
        shader.set_vec3("material.diffuse", self.diffuse);
        shader.set_vec3("material.specular", self.specular);
        shader.set_float("material.shininess", self.shininess);

        let diffuse_map = self.diffuse_map.as_ref().filter(|_| textures);
        shader.set_bool("material.sampleDiffuseMap", diffuse_map.is_some());
        shader.set_int("material.diffuseMap", DIFFUSE_MAP_UNIT as i32);
        if let Some(map) = diffuse_map {
            map.bind(DIFFUSE_MAP_UNIT);
        }

        let specular_map = self.specular_map.as_ref().filter(|_| textures);
        shader.set_bool("material.sampleSpecularMap", specular_map.is_some());
        shader.set_int("material.specularMap", SPECULAR_MAP_UNIT as i32);
        if let Some(map) = specular_map {
            map.bind(SPECULAR_MAP_UNIT);
        }
    }
}

/// GPU-resident model: meshes paired with their materials.
pub struct Model {
    parts: Vec<(Mesh, Material)>,
}

impl Model {
    /// Upload meshes and decode material textures. A texture that fails to
    /// load is logged and left unbound.
    pub fn upload(data: &ModelData) -> Self {
        let mut cache: HashMap<PathBuf, Rc<Texture2D>> = HashMap::new();
        let mut texture = |path: &Option<PathBuf>| -> Option<Rc<Texture2D>> {
            let path = path.as_ref()?;
            if let Some(tex) = cache.get(path) {
                return Some(Rc::clone(tex));
            }
            match Texture2D::from_file(path) {
                Ok(tex) => {
                    let tex = Rc::new(tex);
                    cache.insert(path.clone(), Rc::clone(&tex));
                    Some(tex)
                }
                Err(e) => {
                    warn!("Texture failed to load at path {}: {e}", path.display());
                    None
                }
            }
        };

        let parts = data
            .meshes
            .iter()
            .map(|mesh| {
                let m = &mesh.material;
                let material = Material {
                    ambient: m.ambient,
                    diffuse: m.diffuse,
                    specular: m.specular,
                    shininess: m.shininess,
                    diffuse_map: texture(&m.diffuse_map),
                    specular_map: texture(&m.specular_map),
                };
                (Mesh::upload(mesh), material)
            })
            .collect();

        info!(
            "Uploaded {} ({} meshes, {} vertices, {} indices)",
            data.path.display(),
            data.meshes.len(),
            data.vertex_count(),
            data.index_count()
        );
        Self { parts }
    }

    /// Draw every mesh. `textures = false` keeps material colours but skips
    /// the maps, as the depth and hemicube passes do.
    pub fn draw(&self, shader: &mut ShaderProgram, textures: bool) {
        for (mesh, material) in &self.parts {
            material.bind(shader, textures);
            mesh.draw();
        }
        unsafe {
            gl::ActiveTexture(gl::TEXTURE0);
        }
    }
}

/// Holds all loaded models. Entities reference models by ModelHandle index.
pub struct ModelStore {
    models: Vec<Model>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self { models: Vec::new() }
    }

    pub fn add(&mut self, model: Model) -> ModelHandle {
        let handle = ModelHandle(self.models.len());
        self.models.push(model);
        handle
    }

    pub fn get(&self, handle: ModelHandle) -> &Model {
        &self.models[handle.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const QUAD_OBJ: &str = "\
v -1 0 -1
v 1 0 -1
v 1 0 1
v -1 0 1
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 1 0
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn loads_and_triangulates_obj() {
        let mut file = tempfile::Builder::new().suffix(".obj").tempfile().unwrap();
        file.write_all(QUAD_OBJ.as_bytes()).unwrap();

        let data = load_model_data(file.path()).unwrap();
        assert_eq!(data.meshes.len(), 1);
        let mesh = &data.meshes[0];
        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.normals.len(), 4);
        // v is flipped on load
        assert!(mesh.uvs.contains(&[0.0, 1.0]));
        assert!(mesh.uvs.contains(&[1.0, 0.0]));
        assert_eq!(mesh.material, MaterialData::default());
        assert_eq!(data.vertex_count(), 4);
        assert_eq!(data.index_count(), 6);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_model_data(Path::new("does/not/exist.obj")).unwrap_err();
        assert!(err.to_string().contains("exist.obj"));
    }
}
