use std::path::Path;

use gl::types::*;
use log::warn;

/// Owning handle to a GL 2D texture. Deleted on drop.
pub struct Texture2D {
    id: GLuint,
    width: u32,
    height: u32,
}

/// How a texture is sampled and what lies beyond its edges.
#[derive(Debug, Clone, Copy)]
pub struct SamplerDesc {
    pub filter: GLenum,
    pub wrap: GLenum,
    pub border: Option<[f32; 4]>,
}

impl SamplerDesc {
    pub const NEAREST_BORDER_LIT: SamplerDesc = SamplerDesc {
        filter: gl::NEAREST,
        wrap: gl::CLAMP_TO_BORDER,
        border: Some([1.0, 1.0, 1.0, 1.0]),
    };

    pub const LINEAR_BORDER_MOMENTS: SamplerDesc = SamplerDesc {
        filter: gl::LINEAR,
        wrap: gl::CLAMP_TO_BORDER,
        border: Some([1.0, 1.0, 0.0, 1.0]),
    };

    pub const LINEAR_CLAMP: SamplerDesc = SamplerDesc {
        filter: gl::LINEAR,
        wrap: gl::CLAMP_TO_EDGE,
        border: None,
    };
}

impl Texture2D {
    /// Allocate uninitialised storage for a render-target attachment.
    pub fn storage(
        width: u32,
        height: u32,
        internal_format: GLenum,
        format: GLenum,
        data_type: GLenum,
        sampler: SamplerDesc,
    ) -> Self {
        let mut id = 0;
        unsafe {
            gl::GenTextures(1, &mut id);
            gl::BindTexture(gl::TEXTURE_2D, id);
            gl::TexImage2D(
                gl::TEXTURE_2D,
                0,
                internal_format as GLint,
                width as GLsizei,
                height as GLsizei,
                0,
                format,
                data_type,
                std::ptr::null(),
            );
            apply_sampler(sampler);
            gl::BindTexture(gl::TEXTURE_2D, 0);
        }
        Self { id, width, height }
    }

    pub fn depth(size: u32) -> Self {
        Self::storage(
            size,
            size,
            gl::DEPTH_COMPONENT24,
            gl::DEPTH_COMPONENT,
            gl::FLOAT,
            SamplerDesc::NEAREST_BORDER_LIT,
        )
    }

    /// Two-channel float texture holding depth mean and mean square.
    pub fn moments(size: u32) -> Self {
        Self::storage(size, size, gl::RG32F, gl::RG, gl::FLOAT, SamplerDesc::LINEAR_BORDER_MOMENTS)
    }

    /// Single black texel standing in for a lightmap that was never baked.
    pub fn lightmap_placeholder() -> Self {
        let texel: [u8; 4] = [0, 0, 0, 255];
        let mut id = 0;
        unsafe {
            gl::GenTextures(1, &mut id);
            gl::BindTexture(gl::TEXTURE_2D, id);
            apply_sampler(SamplerDesc::LINEAR_CLAMP);
            gl::TexImage2D(
                gl::TEXTURE_2D,
                0,
                gl::RGBA as GLint,
                1,
                1,
                0,
                gl::RGBA,
                gl::UNSIGNED_BYTE,
                texel.as_ptr() as *const _,
            );
            gl::BindTexture(gl::TEXTURE_2D, 0);
        }
        Self {
            id,
            width: 1,
            height: 1,
        }
    }

    /// Decode an image file into a mipmapped RGBA texture.
    pub fn from_file(path: &Path) -> Result<Self, image::ImageError> {
        let rgba = image::open(path)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        let mut id = 0;
        unsafe {
            gl::GenTextures(1, &mut id);
            gl::BindTexture(gl::TEXTURE_2D, id);
            gl::TexImage2D(
                gl::TEXTURE_2D,
                0,
                gl::RGBA as GLint,
                width as GLsizei,
                height as GLsizei,
                0,
                gl::RGBA,
                gl::UNSIGNED_BYTE,
                rgba.as_raw().as_ptr() as *const _,
            );
            gl::GenerateMipmap(gl::TEXTURE_2D);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, gl::REPEAT as GLint);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, gl::REPEAT as GLint);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, gl::LINEAR_MIPMAP_LINEAR as GLint);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, gl::LINEAR as GLint);
            gl::BindTexture(gl::TEXTURE_2D, 0);
        }
        Ok(Self { id, width, height })
    }

    /// Replace the contents with `width × height` RGBA float texels. Storage
    /// is reused when the size is unchanged.
    pub fn upload_rgba_f32(&mut self, width: u32, height: u32, data: &[f32]) {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            warn!(
                "Texture upload skipped: {} floats for a {}x{} RGBA image (expected {})",
                data.len(),
                width,
                height,
                expected
            );
            return;
        }
        unsafe {
            gl::BindTexture(gl::TEXTURE_2D, self.id);
            if (width, height) == (self.width, self.height) {
                gl::TexSubImage2D(
                    gl::TEXTURE_2D,
                    0,
                    0,
                    0,
                    width as GLsizei,
                    height as GLsizei,
                    gl::RGBA,
                    gl::FLOAT,
                    data.as_ptr() as *const _,
                );
            } else {
                gl::TexImage2D(
                    gl::TEXTURE_2D,
                    0,
                    gl::RGBA as GLint,
                    width as GLsizei,
                    height as GLsizei,
                    0,
                    gl::RGBA,
                    gl::FLOAT,
                    data.as_ptr() as *const _,
                );
            }
            gl::BindTexture(gl::TEXTURE_2D, 0);
        }
        self.width = width;
        self.height = height;
    }

    pub fn bind(&self, unit: u32) {
        unsafe {
            gl::ActiveTexture(gl::TEXTURE0 + unit);
            gl::BindTexture(gl::TEXTURE_2D, self.id);
        }
    }

    pub fn id(&self) -> GLuint {
        self.id
    }

}

impl Drop for Texture2D {
    fn drop(&mut self) {
        unsafe {
            gl::DeleteTextures(1, &self.id);
        }
    }
}

unsafe fn apply_sampler(sampler: SamplerDesc) {
    gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, sampler.filter as GLint);
    gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, sampler.filter as GLint);
    gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, sampler.wrap as GLint);
    gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, sampler.wrap as GLint);
    if let Some(border) = sampler.border {
        gl::TexParameterfv(gl::TEXTURE_2D, gl::TEXTURE_BORDER_COLOR, border.as_ptr());
    }
}
