use gl::types::*;
use glam::{Mat4, Vec3};
use std::collections::HashMap;
use std::ffi::CString;
use std::ptr;
use thiserror::Error;

use super::uniforms::UniformValue;

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("{stage} shader '{label}' failed to compile: {log}")]
    Compile {
        label: &'static str,
        stage: &'static str,
        log: String,
    },
    #[error("shader program '{label}' failed to link: {log}")]
    Link { label: &'static str, log: String },
    #[error("shader '{label}' source contains an interior NUL byte")]
    InvalidSource { label: &'static str },
}

pub struct ShaderProgram {
    pub id: GLuint,
    label: &'static str,
    uniform_cache: HashMap<String, GLint>,
}

impl ShaderProgram {
    pub fn from_sources(label: &'static str, vert_src: &str, frag_src: &str) -> Result<Self, ShaderError> {
        unsafe {
            let vert = compile_shader(label, vert_src, gl::VERTEX_SHADER)?;
            let frag = match compile_shader(label, frag_src, gl::FRAGMENT_SHADER) {
                Ok(frag) => frag,
                Err(e) => {
                    gl::DeleteShader(vert);
                    return Err(e);
                }
            };

            let program = gl::CreateProgram();
            gl::AttachShader(program, vert);
            gl::AttachShader(program, frag);
            gl::LinkProgram(program);
            gl::DeleteShader(vert);
            gl::DeleteShader(frag);

            let mut success = 0;
            gl::GetProgramiv(program, gl::LINK_STATUS, &mut success);
            if success == 0 {
                let mut len = 0;
                gl::GetProgramiv(program, gl::INFO_LOG_LENGTH, &mut len);
                let mut buf = vec![0u8; len.max(1) as usize];
                gl::GetProgramInfoLog(program, len, ptr::null_mut(), buf.as_mut_ptr() as *mut _);
                buf.pop(); // remove null terminator
                gl::DeleteProgram(program);
                return Err(ShaderError::Link {
                    label,
                    log: String::from_utf8_lossy(&buf).to_string(),
                });
            }

            log::debug!("Linked shader program '{label}' ({program})");
            Ok(Self {
                id: program,
                label,
                uniform_cache: HashMap::new(),
            })
        }
    }

    pub fn bind(&self) {
        unsafe {
            gl::UseProgram(self.id);
        }
    }

    fn get_uniform_location(&mut self, name: &str) -> GLint {
        if let Some(&loc) = self.uniform_cache.get(name) {
            return loc;
        }
        // -1 makes every glUniform* call a silent no-op, same as an unused uniform.
        let loc = match CString::new(name) {
            Ok(cname) => unsafe { gl::GetUniformLocation(self.id, cname.as_ptr()) },
            Err(_) => -1,
        };
        if loc < 0 {
            log::trace!("Uniform '{name}' is not active in '{}'", self.label);
        }
        self.uniform_cache.insert(name.to_string(), loc);
        loc
    }

    pub fn set_mat4(&mut self, name: &str, mat: &Mat4) {
        let loc = self.get_uniform_location(name);
        unsafe {
            gl::UniformMatrix4fv(loc, 1, gl::FALSE, mat.to_cols_array().as_ptr());
        }
    }

    pub fn set_vec3(&mut self, name: &str, v: Vec3) {
        let loc = self.get_uniform_location(name);
        unsafe {
            gl::Uniform3f(loc, v.x, v.y, v.z);
        }
    }

    pub fn set_float(&mut self, name: &str, val: f32) {
        let loc = self.get_uniform_location(name);
        unsafe {
            gl::Uniform1f(loc, val);
        }
    }

    pub fn set_int(&mut self, name: &str, val: i32) {
        let loc = self.get_uniform_location(name);
        unsafe {
            gl::Uniform1i(loc, val);
        }
    }

    pub fn set_bool(&mut self, name: &str, val: bool) {
        self.set_int(name, val as i32);
    }

    pub fn set(&mut self, name: &str, value: &UniformValue) {
        match value {
            UniformValue::Int(v) => self.set_int(name, *v),
            UniformValue::Bool(v) => self.set_bool(name, *v),
            UniformValue::Float(v) => self.set_float(name, *v),
            UniformValue::Vec3(v) => self.set_vec3(name, *v),
            UniformValue::Mat4(m) => self.set_mat4(name, m),
        }
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        unsafe {
            gl::DeleteProgram(self.id);
        }
    }
}

unsafe fn compile_shader(label: &'static str, src: &str, shader_type: GLenum) -> Result<GLuint, ShaderError> {
    let c_src = CString::new(src).map_err(|_| ShaderError::InvalidSource { label })?;
    let shader = gl::CreateShader(shader_type);
    gl::ShaderSource(shader, 1, &c_src.as_ptr(), ptr::null());
    gl::CompileShader(shader);

    let mut success = 0;
    gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut success);
    if success == 0 {
        let mut len = 0;
        gl::GetShaderiv(shader, gl::INFO_LOG_LENGTH, &mut len);
        let mut buf = vec![0u8; len.max(1) as usize];
        gl::GetShaderInfoLog(shader, len, ptr::null_mut(), buf.as_mut_ptr() as *mut _);
        buf.pop();
        let stage = if shader_type == gl::VERTEX_SHADER {
            "vertex"
        } else {
            "fragment"
        };
        gl::DeleteShader(shader);
        return Err(ShaderError::Compile {
            label,
            stage,
            log: String::from_utf8_lossy(&buf).to_string(),
        });
    }
    Ok(shader)
}
