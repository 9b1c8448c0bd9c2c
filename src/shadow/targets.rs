use log::{error, info};

use super::{ShadowAlgorithm, ShadowResources};
use crate::renderer::target::RenderTarget;
use crate::renderer::texture::Texture2D;

/// Render targets owned by one directional light.
pub struct ShadowTarget {
    /// Depth attachment; for VSM it also carries the moment colour attachment.
    pub depth: RenderTarget,
    /// VSM blur ping-pong: `[horizontal output, vertical output]`.
    pub filters: Option<[RenderTarget; 2]>,
}

impl ShadowTarget {
    /// Texture the scene shader samples for this light.
    pub fn sampled_texture(&self) -> Option<&Texture2D> {
        match &self.filters {
            Some([_, vertical]) => vertical.color(),
            None => self.depth.depth(),
        }
    }
}

/// Shadow render targets for every directional light.
pub struct ShadowTargetSet {
    algorithm: ShadowAlgorithm,
    resolution: u32,
    targets: Vec<ShadowTarget>,
    incomplete: Vec<String>,
}

impl ShadowTargetSet {
    pub fn new(algorithm: ShadowAlgorithm, lights: usize, resolution: u32) -> Self {
        let mut set = Self {
            algorithm,
            resolution,
            targets: Vec::new(),
            incomplete: Vec::new(),
        };
        set.allocate(lights);
        set
    }

    /// Release every target and allocate a fresh set.
    pub fn reallocate(&mut self, algorithm: ShadowAlgorithm, lights: usize, resolution: u32) {
        self.targets.clear();
        self.incomplete.clear();
        self.algorithm = algorithm;
        self.resolution = resolution;
        self.allocate(lights);
    }

    fn allocate(&mut self, lights: usize) {
        let plan = self.algorithm.resources_needed(lights);
        let size = self.resolution;
        for i in 0..plan.depth_targets {
            let target = if plan.moment_targets > 0 {
                ShadowTarget {
                    depth: RenderTarget::depth_with_moments(size),
                    filters: Some([RenderTarget::moments_only(size), RenderTarget::moments_only(size)]),
                }
            } else {
                ShadowTarget {
                    depth: RenderTarget::depth_only(size),
                    filters: None,
                }
            };
            self.check(&target.depth, format!("shadow depth {i}"));
            if let Some([h, v]) = &target.filters {
                self.check(h, format!("shadow filter {}", 2 * i));
                self.check(v, format!("shadow filter {}", 2 * i + 1));
            }
            self.targets.push(target);
        }
        info!(
            "Allocated {:?} shadow targets at {size}x{size}: {} depth, {} moment, {} filter",
            self.algorithm, plan.depth_targets, plan.moment_targets, plan.filter_targets
        );
    }

    /// An incomplete framebuffer is not fatal: it is logged and kept, and
    /// draws into it have undefined results.
    fn check(&mut self, target: &RenderTarget, label: String) {
        if let Err(e) = target.validate(&label) {
            error!("{e}");
            self.incomplete.push(label);
        }
    }

    pub fn algorithm(&self) -> ShadowAlgorithm {
        self.algorithm
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn targets(&self) -> &[ShadowTarget] {
        &self.targets
    }

    pub fn get(&self, light: usize) -> Option<&ShadowTarget> {
        self.targets.get(light)
    }

    /// Counts of what is actually allocated, in the same shape as the plan.
    pub fn allocated(&self) -> ShadowResources {
        let with_filters = self.targets.iter().filter(|t| t.filters.is_some()).count();
        ShadowResources {
            depth_targets: self.targets.len(),
            moment_targets: with_filters,
            filter_targets: with_filters * 2,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.incomplete.is_empty()
    }
}
