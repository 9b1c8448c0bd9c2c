use anyhow::{anyhow, Result};
use log::info;
use sdl2::video::{GLContext, GLProfile, Window};
use sdl2::Sdl;

pub struct ViewerWindow {
    _gl_context: GLContext,
    window: Window,
}

impl ViewerWindow {
    /// Open a resizable window with a GL 3.3 core context and load the GL
    /// function pointers.
    pub fn new(sdl: &Sdl, title: &str, width: u32, height: u32) -> Result<Self> {
        let video = sdl.video().map_err(|e| anyhow!("failed to init SDL2 video: {e}"))?;

        let gl_attr = video.gl_attr();
        gl_attr.set_context_profile(GLProfile::Core);
        gl_attr.set_context_version(3, 3);

        let window = video
            .window(title, width, height)
            .opengl()
            .resizable()
            .position_centered()
            .build()?;

        let gl_context = window
            .gl_create_context()
            .map_err(|e| anyhow!("failed to create GL context: {e}"))?;

        gl::load_with(|s| video.gl_get_proc_address(s) as *const _);
        info!("Window {width}x{height} with GL 3.3 core context");

        Ok(Self {
            _gl_context: gl_context,
            window,
        })
    }

    pub fn swap(&self) {
        self.window.gl_swap_window();
    }

    pub fn size(&self) -> (u32, u32) {
        self.window.drawable_size()
    }

    pub fn aspect_ratio(&self) -> f32 {
        let (w, h) = self.size();
        w as f32 / h.max(1) as f32
    }
}
