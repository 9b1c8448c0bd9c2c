use gl::types::*;
use thiserror::Error;

use super::texture::{SamplerDesc, Texture2D};

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("framebuffer '{label}' is incomplete (status 0x{status:04x})")]
    Incomplete { label: String, status: GLenum },
}

/// Owning handle to a framebuffer plus the textures attached to it.
/// The framebuffer is deleted on drop; attachments drop with it.
pub struct RenderTarget {
    fbo: GLuint,
    color: Option<Texture2D>,
    depth: Option<Texture2D>,
    width: u32,
    height: u32,
}

impl RenderTarget {
    /// Depth-only target; colour reads and writes are disabled.
    pub fn depth_only(size: u32) -> Self {
        let depth = Texture2D::depth(size);
        let fbo = gen_framebuffer();
        unsafe {
            gl::BindFramebuffer(gl::FRAMEBUFFER, fbo);
            gl::FramebufferTexture2D(gl::FRAMEBUFFER, gl::DEPTH_ATTACHMENT, gl::TEXTURE_2D, depth.id(), 0);
            gl::DrawBuffer(gl::NONE);
            gl::ReadBuffer(gl::NONE);
            gl::BindFramebuffer(gl::FRAMEBUFFER, 0);
        }
        Self {
            fbo,
            color: None,
            depth: Some(depth),
            width: size,
            height: size,
        }
    }

    /// Depth target that also writes depth moments to colour attachment 0.
    pub fn depth_with_moments(size: u32) -> Self {
        let depth = Texture2D::depth(size);
        let moments = Texture2D::moments(size);
        let fbo = gen_framebuffer();
        unsafe {
            gl::BindFramebuffer(gl::FRAMEBUFFER, fbo);
            gl::FramebufferTexture2D(gl::FRAMEBUFFER, gl::DEPTH_ATTACHMENT, gl::TEXTURE_2D, depth.id(), 0);
            gl::FramebufferTexture2D(gl::FRAMEBUFFER, gl::COLOR_ATTACHMENT0, gl::TEXTURE_2D, moments.id(), 0);
            let draw_buffers = [gl::COLOR_ATTACHMENT0];
            gl::DrawBuffers(1, draw_buffers.as_ptr());
            gl::BindFramebuffer(gl::FRAMEBUFFER, 0);
        }
        Self {
            fbo,
            color: Some(moments),
            depth: Some(depth),
            width: size,
            height: size,
        }
    }

    /// Colour-only moment target used by the separable blur.
    pub fn moments_only(size: u32) -> Self {
        let moments = Texture2D::moments(size);
        let fbo = gen_framebuffer();
        unsafe {
            gl::BindFramebuffer(gl::FRAMEBUFFER, fbo);
            gl::FramebufferTexture2D(gl::FRAMEBUFFER, gl::COLOR_ATTACHMENT0, gl::TEXTURE_2D, moments.id(), 0);
            gl::BindFramebuffer(gl::FRAMEBUFFER, 0);
        }
        Self {
            fbo,
            color: Some(moments),
            depth: None,
            width: size,
            height: size,
        }
    }

    /// RGBA float colour plus depth, for offscreen scene rendering.
    pub fn hdr_color_depth(width: u32, height: u32) -> Self {
        let color = Texture2D::storage(width, height, gl::RGBA32F, gl::RGBA, gl::FLOAT, SamplerDesc::LINEAR_CLAMP);
        let depth = Texture2D::storage(
            width,
            height,
            gl::DEPTH_COMPONENT24,
            gl::DEPTH_COMPONENT,
            gl::FLOAT,
            SamplerDesc::LINEAR_CLAMP,
        );
        let fbo = gen_framebuffer();
        unsafe {
            gl::BindFramebuffer(gl::FRAMEBUFFER, fbo);
            gl::FramebufferTexture2D(gl::FRAMEBUFFER, gl::COLOR_ATTACHMENT0, gl::TEXTURE_2D, color.id(), 0);
            gl::FramebufferTexture2D(gl::FRAMEBUFFER, gl::DEPTH_ATTACHMENT, gl::TEXTURE_2D, depth.id(), 0);
            gl::BindFramebuffer(gl::FRAMEBUFFER, 0);
        }
        Self {
            fbo,
            color: Some(color),
            depth: Some(depth),
            width,
            height,
        }
    }

    /// Check framebuffer completeness. Leaves the default framebuffer bound.
    pub fn validate(&self, label: &str) -> Result<(), TargetError> {
        let status = unsafe {
            gl::BindFramebuffer(gl::FRAMEBUFFER, self.fbo);
            let status = gl::CheckFramebufferStatus(gl::FRAMEBUFFER);
            gl::BindFramebuffer(gl::FRAMEBUFFER, 0);
            status
        };
        if status == gl::FRAMEBUFFER_COMPLETE {
            Ok(())
        } else {
            Err(TargetError::Incomplete {
                label: label.to_string(),
                status,
            })
        }
    }

    pub fn bind(&self) {
        unsafe {
            gl::BindFramebuffer(gl::FRAMEBUFFER, self.fbo);
        }
    }

    pub fn color(&self) -> Option<&Texture2D> {
        self.color.as_ref()
    }

    pub fn depth(&self) -> Option<&Texture2D> {
        self.depth.as_ref()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        unsafe {
            gl::DeleteFramebuffers(1, &self.fbo);
        }
    }
}

fn gen_framebuffer() -> GLuint {
    let mut fbo = 0;
    unsafe {
        gl::GenFramebuffers(1, &mut fbo);
    }
    fbo
}

/// Bind the window's framebuffer and restore its viewport.
pub fn bind_default(width: u32, height: u32) {
    unsafe {
        gl::BindFramebuffer(gl::FRAMEBUFFER, 0);
        gl::Viewport(0, 0, width as GLsizei, height as GLsizei);
    }
}
