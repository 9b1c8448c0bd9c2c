//! Hemicube lightmap baking.
//!
//! A bake renders the scene from every covered lightmap texel (see
//! [`context`]), post-processes the result on the CPU, writes it to disk and
//! hands the texels back for upload. [`BakeTask`] runs that as a sequence of
//! budgeted steps so it can be blocking or spread over frames.

pub mod context;
pub mod geometry;
pub mod image_ops;
pub mod raster;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use glam::Vec3;
use log::{error, info, warn};
use thiserror::Error;

use crate::config::{BAKE_SKY_COLOR, DEFAULT_BAKE_OUTPUT, DEFAULT_HEMICUBE_RESOLUTION, DEFAULT_LIGHTMAP_SIZE};
use crate::renderer::target::TargetError;
use context::{BakeContext, HemicubeView};
use geometry::BakeGeometry;

const CHANNELS: usize = 4;
/// Minimum time between two progress reports.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);
const MAX_INTERPOLATION_PASSES: u32 = 8;

#[derive(Debug, Error)]
pub enum BakeError {
    #[error("invalid bake settings: {0}")]
    InvalidSettings(String),
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error("not enough memory for the lightmap buffer ({bytes} bytes)")]
    OutOfMemory { bytes: usize },
    #[error("bake cancelled")]
    Cancelled,
    #[error("lightmap buffer holds {actual} floats, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
    #[error("failed to save lightmap: {0}")]
    Save(#[from] image::ImageError),
}

/// Parameters of the hemicube renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct HemicubeSettings {
    /// Edge of the front face in pixels.
    pub resolution: u32,
    pub z_near: f32,
    pub z_far: f32,
    /// What a hemicube sees where no geometry is drawn.
    pub clear_color: Vec3,
    pub interpolation_passes: u32,
    /// Largest per-channel spread between neighbours that may be interpolated.
    pub interpolation_threshold: f32,
    pub camera_to_surface_distance_modifier: f32,
}

impl Default for HemicubeSettings {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_HEMICUBE_RESOLUTION,
            z_near: 0.001,
            z_far: 10.0,
            clear_color: BAKE_SKY_COLOR,
            interpolation_passes: 5,
            interpolation_threshold: 0.0001,
            camera_to_surface_distance_modifier: 0.0,
        }
    }
}

impl HemicubeSettings {
    pub fn validate(&self) -> Result<(), BakeError> {
        let invalid = |reason: String| Err(BakeError::InvalidSettings(reason));
        if !self.resolution.is_power_of_two() || !(16..=512).contains(&self.resolution) {
            return invalid(format!(
                "hemicube resolution {} must be a power of two in 16..=512",
                self.resolution
            ));
        }
        if !(self.z_near > 0.0 && self.z_far > self.z_near) {
            return invalid(format!("clip range {}..{} is empty", self.z_near, self.z_far));
        }
        if self.interpolation_passes > MAX_INTERPOLATION_PASSES {
            return invalid(format!(
                "{} interpolation passes exceeds {MAX_INTERPOLATION_PASSES}",
                self.interpolation_passes
            ));
        }
        if !(self.interpolation_threshold >= 0.0) {
            return invalid(format!("interpolation threshold {} is negative", self.interpolation_threshold));
        }
        if !self.camera_to_surface_distance_modifier.is_finite() || self.camera_to_surface_distance_modifier < -1.0 {
            return invalid(format!(
                "camera distance modifier {} must be at least -1",
                self.camera_to_surface_distance_modifier
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BakeSettings {
    pub width: u32,
    pub height: u32,
    pub output_path: PathBuf,
    pub hemicube: HemicubeSettings,
}

impl Default for BakeSettings {
    fn default() -> Self {
        Self {
            width: DEFAULT_LIGHTMAP_SIZE,
            height: DEFAULT_LIGHTMAP_SIZE,
            output_path: PathBuf::from(DEFAULT_BAKE_OUTPUT),
            hemicube: HemicubeSettings::default(),
        }
    }
}

/// Lifecycle notifications published by a running bake.
#[derive(Debug, Clone, PartialEq)]
pub enum BakeEvent {
    Started { triangles: usize, texels: usize },
    /// Percentage in `0..=100`.
    Progress(f32),
    /// `output` is `None` when the TGA could not be written.
    Finished { output: Option<PathBuf>, elapsed: Duration },
    Cancelled,
    Failed(String),
}

/// Observer side of a bake: event stream plus a cancel switch.
#[derive(Debug, Clone)]
pub struct BakeHandle {
    events: Receiver<BakeEvent>,
    cancel: Arc<AtomicBool>,
}

impl BakeHandle {
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Drain pending events without blocking.
    pub fn events(&self) -> impl Iterator<Item = BakeEvent> + '_ {
        self.events.try_iter()
    }
}

/// Result of one [`BakeTask::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BakeStatus {
    /// Budget spent; `progress` is in `0..=1`.
    Running { progress: f32 },
    /// Every texel is lit; call [`BakeTask::finish`].
    Complete,
    Cancelled,
}

/// Zeroed `width × height` RGBA buffer, or `OutOfMemory` if it cannot be had.
pub fn allocate_buffer(width: u32, height: u32) -> Result<Vec<f32>, BakeError> {
    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(CHANNELS))
        .ok_or(BakeError::OutOfMemory { bytes: usize::MAX })?;
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| BakeError::OutOfMemory {
            bytes: len.saturating_mul(std::mem::size_of::<f32>()),
        })?;
    buffer.resize(len, 0.0);
    Ok(buffer)
}

/// Rate limit for progress reports. The first poll always fires.
#[derive(Debug, Clone)]
pub struct ProgressGate {
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressGate {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    /// Whether a report is due at `now`; if so, restarts the interval.
    pub fn poll(&mut self, now: Instant) -> bool {
        let due = self.last.map_or(true, |t| now.saturating_duration_since(t) >= self.interval);
        if due {
            self.last = Some(now);
        }
        due
    }
}

/// Post-process the lit texels and write them to `output_path`. A failed
/// write is logged and the texels are returned anyway. The bool reports
/// whether the file was saved.
pub fn finalize_texels(
    mut data: Vec<f32>,
    width: u32,
    height: u32,
    output_path: &Path,
) -> Result<(Vec<f32>, bool), BakeError> {
    let mut temp = allocate_buffer(width, height)?;
    image_ops::post_process(&mut data, &mut temp, width, height);
    let saved = match image_ops::save_tga(output_path, &data, width, height, 1.0) {
        Ok(()) => true,
        Err(e) => {
            error!("Lightmap not written to {}: {e}", output_path.display());
            false
        }
    };
    Ok((data, saved))
}

/// One bake in progress. Owns the hemicube context and the texel buffer
/// until [`finish`](Self::finish).
pub struct BakeTask {
    settings: BakeSettings,
    context: Option<BakeContext>,
    events: Sender<BakeEvent>,
    cancel: Arc<AtomicBool>,
    started: Instant,
    progress: ProgressGate,
    triangles: usize,
}

impl BakeTask {
    /// Allocate the context and buffer and rasterise `geometry`. On error
    /// nothing has been touched outside the task.
    pub fn start(settings: BakeSettings, geometry: &BakeGeometry) -> Result<(Self, BakeHandle), BakeError> {
        if settings.width == 0 || settings.height == 0 {
            return Err(BakeError::InvalidSettings(format!(
                "lightmap size {}x{} is empty",
                settings.width, settings.height
            )));
        }
        info!(
            "Baking lightmap: {} vertices, {} indices",
            geometry.vertices.len(),
            geometry.indices.len()
        );

        let mut context = BakeContext::new(settings.hemicube.clone())?;
        let buffer = allocate_buffer(settings.width, settings.height)?;
        context.set_target(buffer, settings.width, settings.height);
        context.set_geometry(geometry);

        let (tx, rx) = crossbeam_channel::unbounded();
        let cancel = Arc::new(AtomicBool::new(false));
        let triangles = geometry.triangle_count();
        let _ = tx.send(BakeEvent::Started {
            triangles,
            texels: settings.width as usize * settings.height as usize,
        });

        let task = Self {
            settings,
            context: Some(context),
            events: tx,
            cancel: Arc::clone(&cancel),
            started: Instant::now(),
            progress: ProgressGate::new(PROGRESS_INTERVAL),
            triangles,
        };
        Ok((task, BakeHandle { events: rx, cancel }))
    }

    /// Render hemicube faces until done or until `budget` is spent. `None`
    /// means no limit. At least one face is rendered per call, so a stepped
    /// bake always advances. `render` draws the whole scene into the given
    /// view; the hemicube atlas is already bound.
    pub fn step(&mut self, render: &mut dyn FnMut(&HemicubeView), budget: Option<Duration>) -> BakeStatus {
        let deadline = budget.map(|b| Instant::now() + b);
        loop {
            if self.cancel.load(Ordering::Relaxed) {
                self.context = None;
                warn!("Lightmap bake cancelled");
                let _ = self.events.send(BakeEvent::Cancelled);
                return BakeStatus::Cancelled;
            }
            let Some(context) = self.context.as_mut() else {
                return BakeStatus::Complete;
            };
            match context.begin() {
                Some(view) => {
                    render(&view);
                    context.end();
                }
                None => return BakeStatus::Complete,
            }

            let progress = context.progress();
            let now = Instant::now();
            if self.progress.poll(now) {
                let percent = progress * 100.0;
                info!("Baking... {percent:.0}%");
                let _ = self.events.send(BakeEvent::Progress(percent));
            }
            if deadline.is_some_and(|d| now >= d) {
                return BakeStatus::Running { progress };
            }
        }
    }

    /// Release the context, post-process, save the TGA and return the final
    /// texels. Call after `step` reported `Complete`. A failed save does not
    /// fail the bake.
    pub fn finish(mut self) -> Result<Vec<f32>, BakeError> {
        let result = self.finish_inner();
        match result {
            Ok((data, saved)) => {
                let elapsed = self.started.elapsed();
                info!("Finished baking {} triangles in {:.1}s", self.triangles, elapsed.as_secs_f32());
                let _ = self.events.send(BakeEvent::Finished {
                    output: saved.then(|| self.settings.output_path.clone()),
                    elapsed,
                });
                Ok(data)
            }
            Err(e) => {
                let _ = self.events.send(BakeEvent::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    fn finish_inner(&mut self) -> Result<(Vec<f32>, bool), BakeError> {
        let Some(mut context) = self.context.take() else {
            return Err(BakeError::Cancelled);
        };
        let (rendered, interpolated) = context.stats();
        info!("Lit {rendered} texels by hemicube and {interpolated} by interpolation");
        let data = context.take_target();
        drop(context);

        finalize_texels(data, self.settings.width, self.settings.height, &self.settings.output_path)
    }
}

/// Owns at most one bake at a time and drives it from the frame loop.
pub struct LightmapBaker {
    settings: BakeSettings,
    budget: Option<Duration>,
    task: Option<BakeTask>,
    handle: Option<BakeHandle>,
}

impl LightmapBaker {
    /// `budget = None` makes every bake blocking.
    pub fn new(settings: BakeSettings, budget: Option<Duration>) -> Self {
        Self {
            settings,
            budget,
            task: None,
            handle: None,
        }
    }

    pub fn settings(&self) -> &BakeSettings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    pub fn handle(&self) -> Option<&BakeHandle> {
        self.handle.as_ref()
    }

    /// Start a bake unless one is already running.
    pub fn trigger(&mut self, geometry: &BakeGeometry) -> Result<(), BakeError> {
        if self.task.is_some() {
            warn!("Bake already in progress; trigger ignored");
            return Ok(());
        }
        let (task, handle) = BakeTask::start(self.settings.clone(), geometry)?;
        self.task = Some(task);
        self.handle = Some(handle);
        Ok(())
    }

    pub fn cancel(&self) {
        if let Some(handle) = &self.handle {
            handle.cancel();
        }
    }

    /// Advance the running bake by one budget. Returns `Some` when the bake
    /// ends: the final texels, or the reason it stopped.
    pub fn update(&mut self, render: &mut dyn FnMut(&HemicubeView)) -> Option<Result<Vec<f32>, BakeError>> {
        let task = self.task.as_mut()?;
        match task.step(render, self.budget) {
            BakeStatus::Running { .. } => None,
            BakeStatus::Cancelled => {
                self.task = None;
                Some(Err(BakeError::Cancelled))
            }
            BakeStatus::Complete => {
                let task = self.task.take()?;
                Some(task.finish())
            }
        }
    }
}
