//! Hemicube sampling context.
//!
//! Each covered lightmap texel is lit by rendering the scene from its surface
//! point into a hemicube: one full front face along the normal plus four
//! half faces around it. Hemicubes are packed into an offscreen atlas, read
//! back a batch at a time and integrated on the CPU with cosine weights.
//!
//! Usage mirrors a begin/end loop:
//!
//! ```ignore
//! while let Some(view) = context.begin() {
//!     render_scene(&view);
//!     context.end();
//! }
//! ```

use glam::{Mat4, Vec3, Vec4};
use log::{debug, warn};

use super::geometry::BakeGeometry;
use super::raster::{interpolation_level, interpolation_sources, SurfelMap};
use super::{BakeError, HemicubeSettings};
use crate::renderer::target::RenderTarget;

/// Upper bound on the atlas edge, in pixels.
const ATLAS_LIMIT: u32 = 2048;
/// Front face plus four half-height side faces.
pub const FACES_PER_HEMICUBE: usize = 5;
const CHANNELS: usize = 4;

/// One face of one hemicube: where to draw it and with which camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HemicubeView {
    /// `[x, y, width, height]` inside the atlas.
    pub viewport: [i32; 4],
    pub view: Mat4,
    pub projection: Mat4,
}

pub struct BakeContext {
    settings: HemicubeSettings,
    atlas: RenderTarget,
    columns: u32,
    rows: u32,
    /// Per-pixel integration weight of one hemicube slot, `3·res × res`.
    weights: Vec<f32>,
    weight_sum: f32,
    readback: Vec<f32>,

    target: Vec<f32>,
    target_width: u32,
    target_height: u32,

    surfels: Option<SurfelMap>,
    schedule: Vec<Vec<usize>>,
    done: Vec<bool>,
    pass: usize,
    cursor: usize,
    batch: Vec<usize>,
    face: Option<usize>,
    processed: usize,
    rendered: usize,
    interpolated: usize,
}

impl BakeContext {
    /// Validate `settings` and allocate the hemicube atlas.
    pub fn new(settings: HemicubeSettings) -> Result<Self, BakeError> {
        settings.validate()?;
        let res = settings.resolution;
        let columns = (ATLAS_LIMIT / (3 * res)).max(1);
        let rows = (ATLAS_LIMIT / res).max(1);
        let atlas = RenderTarget::hdr_color_depth(columns * 3 * res, rows * res);
        atlas.validate("hemicube atlas")?;

        let (weights, weight_sum) = hemicube_weights(res);
        let (aw, ah) = atlas.size();
        debug!(
            "Hemicube atlas {aw}x{ah}: {} hemicubes of {res}px per batch",
            columns * rows
        );
        Ok(Self {
            settings,
            atlas,
            columns,
            rows,
            weights,
            weight_sum,
            readback: vec![0.0; aw as usize * ah as usize * CHANNELS],
            target: Vec::new(),
            target_width: 0,
            target_height: 0,
            surfels: None,
            schedule: Vec::new(),
            done: Vec::new(),
            pass: 0,
            cursor: 0,
            batch: Vec::new(),
            face: None,
            processed: 0,
            rendered: 0,
            interpolated: 0,
        })
    }

    /// Hand over the RGBA buffer results are written to.
    pub fn set_target(&mut self, buffer: Vec<f32>, width: u32, height: u32) {
        self.target = buffer;
        self.target_width = width;
        self.target_height = height;
    }

    /// Rasterise `geometry` into the target's texel grid and reset progress.
    pub fn set_geometry(&mut self, geometry: &BakeGeometry) {
        let surfels = SurfelMap::rasterize(geometry, self.target_width, self.target_height);
        self.schedule = surfels.schedule(self.settings.interpolation_passes);
        self.done = vec![false; surfels.len()];
        debug!(
            "Rasterised {} texels over {} interpolation passes",
            surfels.len(),
            self.schedule.len()
        );
        self.surfels = Some(surfels);
        self.pass = 0;
        self.cursor = 0;
        self.batch.clear();
        self.face = None;
        self.processed = 0;
        self.rendered = 0;
        self.interpolated = 0;
    }

    /// Take back the target buffer. The context cannot be used afterwards.
    pub fn take_target(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.target)
    }

    pub fn capacity(&self) -> usize {
        (self.columns * self.rows) as usize
    }

    /// Fraction of covered texels rendered or interpolated so far.
    pub fn progress(&self) -> f32 {
        let total = self.done.len();
        if total == 0 {
            1.0
        } else {
            self.processed as f32 / total as f32
        }
    }

    /// `(rendered, interpolated)` texel counts.
    pub fn stats(&self) -> (usize, usize) {
        (self.rendered, self.interpolated)
    }

    /// Bind the atlas and return the next face to render, or `None` once every
    /// texel is done. Each `Some` must be followed by exactly one `end`.
    pub fn begin(&mut self) -> Option<HemicubeView> {
        if self.face.is_none() {
            let surfel = self.next_to_render()?;
            if self.batch.is_empty() {
                self.clear_atlas();
            }
            self.batch.push(surfel);
            self.face = Some(0);
        }
        let face = self.face?;
        let slot = self.batch.len() - 1;
        let surfel = *self.batch.last()?;
        let view = self.face_view(surfel, slot, face)?;

        self.atlas.bind();
        let [x, y, w, h] = view.viewport;
        unsafe {
            gl::Viewport(x, y, w, h);
        }
        Some(view)
    }

    /// Mark the face returned by the last `begin` as rendered.
    pub fn end(&mut self) {
        let Some(face) = self.face else {
            warn!("BakeContext::end called without a matching begin");
            return;
        };
        if face + 1 < FACES_PER_HEMICUBE {
            self.face = Some(face + 1);
            return;
        }
        self.face = None;
        if self.batch.len() == self.capacity() {
            self.integrate_batch();
        }
    }

    /// Next surfel needing a hemicube. Interpolates what it can on the way
    /// and flushes the batch at pass boundaries so the next pass reads
    /// finished neighbours.
    fn next_to_render(&mut self) -> Option<usize> {
        loop {
            let Some(pass) = self.schedule.get(self.pass) else {
                self.integrate_batch();
                return None;
            };
            let Some(&surfel) = pass.get(self.cursor) else {
                self.integrate_batch();
                self.pass += 1;
                self.cursor = 0;
                continue;
            };
            self.cursor += 1;
            if self.try_interpolate(surfel) {
                continue;
            }
            return Some(surfel);
        }
    }

    fn try_interpolate(&mut self, index: usize) -> bool {
        let Some(surfels) = &self.surfels else {
            return false;
        };
        let s = surfels.surfels()[index];
        let passes = self.settings.interpolation_passes;
        let level = interpolation_level(s.x, s.y, passes);
        let sources = interpolation_sources(s.x, s.y, level, passes);
        if sources.is_empty() {
            return false;
        }

        let mut min = Vec4::splat(f32::MAX);
        let mut max = Vec4::splat(f32::MIN);
        let mut sum = Vec4::ZERO;
        for (x, y) in &sources {
            let Some(source) = surfels.at(*x, *y) else {
                return false;
            };
            if !self.done[source] {
                return false;
            }
            let texel = self.texel(*x as u32, *y as u32);
            min = min.min(texel);
            max = max.max(texel);
            sum += texel;
        }
        if (max - min).max_element() > self.settings.interpolation_threshold {
            return false;
        }

        let average = sum / sources.len() as f32;
        self.write_texel(s.x, s.y, average);
        self.done[index] = true;
        self.processed += 1;
        self.interpolated += 1;
        true
    }

    fn texel(&self, x: u32, y: u32) -> Vec4 {
        let i = (y * self.target_width + x) as usize * CHANNELS;
        Vec4::from_slice(&self.target[i..i + CHANNELS])
    }

    fn write_texel(&mut self, x: u32, y: u32, value: Vec4) {
        let i = (y * self.target_width + x) as usize * CHANNELS;
        if let Some(texel) = self.target.get_mut(i..i + CHANNELS) {
            value.write_to_slice(texel);
        }
    }

    fn slot_origin(&self, slot: usize) -> (u32, u32) {
        let res = self.settings.resolution;
        let column = slot as u32 % self.columns;
        let row = slot as u32 / self.columns;
        (column * 3 * res, row * res)
    }

    fn face_view(&self, surfel: usize, slot: usize, face: usize) -> Option<HemicubeView> {
        let s = self.surfels.as_ref()?.surfels()[surfel];
        let (ox, oy) = self.slot_origin(slot);
        Some(hemicube_face(&self.settings, s.position, s.normal, face, (ox as i32, oy as i32)))
    }

    fn clear_atlas(&self) {
        let sky = self.settings.clear_color;
        self.atlas.bind();
        unsafe {
            gl::ClearColor(sky.x, sky.y, sky.z, 1.0);
            gl::Clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT);
        }
    }

    /// Read the atlas back and resolve every hemicube in the batch to one
    /// texel value.
    fn integrate_batch(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        let (aw, ah) = self.atlas.size();
        self.atlas.bind();
        unsafe {
            gl::ReadBuffer(gl::COLOR_ATTACHMENT0);
            gl::ReadPixels(
                0,
                0,
                aw as i32,
                ah as i32,
                gl::RGBA,
                gl::FLOAT,
                self.readback.as_mut_ptr() as *mut _,
            );
            gl::BindFramebuffer(gl::FRAMEBUFFER, 0);
        }

        let res = self.settings.resolution as usize;
        let mut batch = std::mem::take(&mut self.batch);
        for (slot, &index) in batch.iter().enumerate() {
            let (ox, oy) = self.slot_origin(slot);
            let mut radiance = Vec3::ZERO;
            for py in 0..res {
                let row = (oy as usize + py) * aw as usize + ox as usize;
                for px in 0..3 * res {
                    let w = self.weights[py * 3 * res + px];
                    let i = (row + px) * CHANNELS;
                    radiance += Vec3::from_slice(&self.readback[i..i + 3]) * w;
                }
            }
            let radiance = radiance / self.weight_sum;
            let Some(s) = self.surfels.as_ref().map(|m| m.surfels()[index]) else {
                continue;
            };
            self.write_texel(s.x, s.y, radiance.extend(1.0));
            self.done[index] = true;
            self.processed += 1;
            self.rendered += 1;
        }
        batch.clear();
        self.batch = batch;
    }
}

/// Camera and viewport for `face` of the hemicube at `position` facing
/// `normal`. Face 0 looks along the normal; faces 1–4 look along ±tangent
/// and ±bitangent and only see the upper half space.
pub fn hemicube_face(
    settings: &HemicubeSettings,
    position: Vec3,
    normal: Vec3,
    face: usize,
    origin: (i32, i32),
) -> HemicubeView {
    let res = settings.resolution as i32;
    let near = settings.z_near;
    let far = settings.z_far;
    let n = normal.normalize_or(Vec3::Y);
    let helper = if n.y.abs() < 0.999 { Vec3::Y } else { Vec3::X };
    let u = n.cross(helper).normalize();
    let v = n.cross(u);
    let eye = position + n * near * (1.0 + settings.camera_to_surface_distance_modifier);

    let (direction, up, viewport, projection) = if face == 0 {
        (
            n,
            u,
            [origin.0, origin.1, res, res],
            frustum(-near, near, -near, near, near, far),
        )
    } else {
        let k = (face - 1) as i32;
        let direction = [u, -u, v, -v][k as usize];
        (
            direction,
            n,
            [origin.0 + res + (k % 2) * res, origin.1 + (k / 2) * res / 2, res, res / 2],
            frustum(-near, near, 0.0, near, near, far),
        )
    };

    HemicubeView {
        viewport,
        view: Mat4::look_at_rh(eye, eye + direction, up),
        projection,
    }
}

/// Perspective projection for an off-centre near-plane window, as
/// `glFrustum` builds it.
pub fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    Mat4::from_cols(
        Vec4::new(2.0 * near / (right - left), 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 * near / (top - bottom), 0.0, 0.0),
        Vec4::new(
            (right + left) / (right - left),
            (top + bottom) / (top - bottom),
            -(far + near) / (far - near),
            -1.0,
        ),
        Vec4::new(0.0, 0.0, -2.0 * far * near / (far - near), 0.0),
    )
}

/// Cosine-weighted solid angle of every pixel in one `3·res × res` hemicube
/// slot, and their sum.
pub fn hemicube_weights(res: u32) -> (Vec<f32>, f32) {
    let res = res as usize;
    let half = res / 2;
    let mut weights = vec![0.0; 3 * res * res];
    for py in 0..res {
        for px in 0..3 * res {
            let w = if px < res {
                let x = (px as f32 + 0.5) / res as f32 * 2.0 - 1.0;
                let y = (py as f32 + 0.5) / res as f32 * 2.0 - 1.0;
                1.0 / (1.0 + x * x + y * y).powi(2)
            } else {
                let lx = (px - res) % res;
                let ly = py % half;
                let x = (lx as f32 + 0.5) / res as f32 * 2.0 - 1.0;
                let y = (ly as f32 + 0.5) / half as f32;
                y / (1.0 + x * x + y * y).powi(2)
            };
            weights[py * 3 * res + px] = w;
        }
    }
    let sum = weights.iter().sum();
    (weights, sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn frustum_maps_near_window_corners_to_ndc_corners() {
        let m = frustum(-1.0, 1.0, 0.0, 1.0, 1.0, 10.0);
        let bottom_left = m.project_point3(Vec3::new(-1.0, 0.0, -1.0));
        let top_right = m.project_point3(Vec3::new(1.0, 1.0, -1.0));
        assert_relative_eq!(bottom_left.x, -1.0, epsilon = 1e-5);
        assert_relative_eq!(bottom_left.y, -1.0, epsilon = 1e-5);
        assert_relative_eq!(bottom_left.z, -1.0, epsilon = 1e-5);
        assert_relative_eq!(top_right.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(top_right.y, 1.0, epsilon = 1e-5);
        let far = m.project_point3(Vec3::new(0.0, 5.0, -10.0));
        assert_relative_eq!(far.z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn symmetric_frustum_matches_glam_perspective() {
        let m = frustum(-0.5, 0.5, -0.5, 0.5, 0.5, 20.0);
        let reference = Mat4::perspective_rh_gl(90f32.to_radians(), 1.0, 0.5, 20.0);
        assert!(m.abs_diff_eq(reference, 1e-5));
    }

    #[test]
    fn faces_tile_one_slot_without_overlap() {
        let settings = HemicubeSettings {
            resolution: 8,
            ..HemicubeSettings::default()
        };
        let mut covered = vec![0u8; 3 * 8 * 8];
        for face in 0..FACES_PER_HEMICUBE {
            let view = hemicube_face(&settings, Vec3::ZERO, Vec3::Y, face, (0, 0));
            let [x, y, w, h] = view.viewport;
            for py in y..y + h {
                for px in x..x + w {
                    covered[(py * 24 + px) as usize] += 1;
                }
            }
        }
        assert!(covered.iter().all(|&c| c == 1));
    }

    #[test]
    fn front_face_looks_along_normal_from_offset_eye() {
        let settings = HemicubeSettings::default();
        let p = Vec3::new(1.0, 2.0, 3.0);
        let view = hemicube_face(&settings, p, Vec3::Z, 0, (0, 0));
        let eye = view.view.inverse().transform_point3(Vec3::ZERO);
        assert!(eye.abs_diff_eq(p + Vec3::Z * settings.z_near, 1e-5));
        // a point straight ahead lands at the centre of the face
        let ahead = (view.projection * view.view).project_point3(p + Vec3::Z * 2.0);
        assert_relative_eq!(ahead.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(ahead.y, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn side_faces_see_only_the_upper_half() {
        let settings = HemicubeSettings::default();
        for face in 1..FACES_PER_HEMICUBE {
            let view = hemicube_face(&settings, Vec3::ZERO, Vec3::Y, face, (0, 0));
            let clip = view.projection * view.view;
            let eye = view.view.inverse().transform_point3(Vec3::ZERO);
            let forward = view.view.inverse().transform_vector3(Vec3::NEG_Z);
            let above = clip.project_point3(eye + forward + Vec3::Y * 0.5);
            let below = clip.project_point3(eye + forward - Vec3::Y * 0.5);
            assert!(above.y > -1.0 && above.y < 1.0, "face {face}");
            assert!(below.y < -1.0, "face {face}");
        }
    }

    #[test]
    fn weights_favour_the_normal_direction() {
        let (weights, sum) = hemicube_weights(16);
        assert_relative_eq!(sum, weights.iter().sum::<f32>());
        let centre = weights[8 * 48 + 8];
        let corner = weights[0];
        let horizon = weights[16];
        assert!(centre > corner);
        assert!(centre > horizon);
        assert!(weights.iter().all(|w| *w > 0.0));
    }
}
