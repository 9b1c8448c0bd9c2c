use gl::types::*;
use std::mem;
use std::ptr;

use super::model::MeshData;

/// Floats per interleaved vertex: position (3), uv (2), normal (3).
const VERTEX_STRIDE: usize = 8;

pub struct Mesh {
    vao: GLuint,
    vbo: GLuint,
    ebo: GLuint,
    pub index_count: i32,
}

impl Mesh {
    pub fn upload(data: &MeshData) -> Mesh {
        let vertices = interleave(data);
        upload_mesh(&vertices, &data.indices)
    }

    pub fn draw(&self) {
        unsafe {
            gl::BindVertexArray(self.vao);
            gl::DrawElements(gl::TRIANGLES, self.index_count, gl::UNSIGNED_INT, ptr::null());
            gl::BindVertexArray(0);
        }
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        unsafe {
            gl::DeleteVertexArrays(1, &self.vao);
            gl::DeleteBuffers(1, &self.vbo);
            gl::DeleteBuffers(1, &self.ebo);
        }
    }
}

fn interleave(data: &MeshData) -> Vec<f32> {
    let mut vertices = Vec::with_capacity(data.positions.len() * VERTEX_STRIDE);
    for (i, p) in data.positions.iter().enumerate() {
        let uv = data.uvs.get(i).copied().unwrap_or([0.0, 0.0]);
        let n = data.normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]);
        vertices.extend_from_slice(&[p[0], p[1], p[2], uv[0], uv[1], n[0], n[1], n[2]]);
    }
    vertices
}

fn upload_mesh(vertices: &[f32], indices: &[u32]) -> Mesh {
    let mut vao = 0;
    let mut vbo = 0;
    let mut ebo = 0;

    unsafe {
        gl::GenVertexArrays(1, &mut vao);
        gl::GenBuffers(1, &mut vbo);
        gl::GenBuffers(1, &mut ebo);

        gl::BindVertexArray(vao);

        gl::BindBuffer(gl::ARRAY_BUFFER, vbo);
        gl::BufferData(
            gl::ARRAY_BUFFER,
            (vertices.len() * mem::size_of::<f32>()) as GLsizeiptr,
            vertices.as_ptr() as *const _,
            gl::STATIC_DRAW,
        );

        gl::BindBuffer(gl::ELEMENT_ARRAY_BUFFER, ebo);
        gl::BufferData(
            gl::ELEMENT_ARRAY_BUFFER,
            (indices.len() * mem::size_of::<u32>()) as GLsizeiptr,
            indices.as_ptr() as *const _,
            gl::STATIC_DRAW,
        );

        let stride = (VERTEX_STRIDE * mem::size_of::<f32>()) as GLsizei;

        // position attribute (location 0)
        gl::VertexAttribPointer(0, 3, gl::FLOAT, gl::FALSE, stride, ptr::null());
        gl::EnableVertexAttribArray(0);

        // uv attribute (location 1), shared by material textures and the lightmap
        gl::VertexAttribPointer(
            1,
            2,
            gl::FLOAT,
            gl::FALSE,
            stride,
            (3 * mem::size_of::<f32>()) as *const _,
        );
        gl::EnableVertexAttribArray(1);

        // normal attribute (location 2)
        gl::VertexAttribPointer(
            2,
            3,
            gl::FLOAT,
            gl::FALSE,
            stride,
            (5 * mem::size_of::<f32>()) as *const _,
        );
        gl::EnableVertexAttribArray(2);

        gl::BindVertexArray(0);
    }

    Mesh {
        vao,
        vbo,
        ebo,
        index_count: indices.len() as i32,
    }
}

/// Clip-space quad with uvs, drawn as a 4-vertex triangle strip.
/// Used by the moment blur passes.
pub struct FullscreenQuad {
    vao: GLuint,
    vbo: GLuint,
}

impl FullscreenQuad {
    pub fn new() -> Self {
        #[rustfmt::skip]
        let vertices: [f32; 20] = [
            // position        uv
            -1.0, -1.0, 0.0,   0.0, 0.0,
             1.0, -1.0, 0.0,   1.0, 0.0,
            -1.0,  1.0, 0.0,   0.0, 1.0,
             1.0,  1.0, 0.0,   1.0, 1.0,
        ];

        let mut vao = 0;
        let mut vbo = 0;
        unsafe {
            gl::GenVertexArrays(1, &mut vao);
            gl::GenBuffers(1, &mut vbo);
            gl::BindVertexArray(vao);
            gl::BindBuffer(gl::ARRAY_BUFFER, vbo);
            gl::BufferData(
                gl::ARRAY_BUFFER,
                mem::size_of_val(&vertices) as GLsizeiptr,
                vertices.as_ptr() as *const _,
                gl::STATIC_DRAW,
            );
            let stride = (5 * mem::size_of::<f32>()) as GLsizei;
            gl::VertexAttribPointer(0, 3, gl::FLOAT, gl::FALSE, stride, ptr::null());
            gl::EnableVertexAttribArray(0);
            gl::VertexAttribPointer(
                1,
                2,
                gl::FLOAT,
                gl::FALSE,
                stride,
                (3 * mem::size_of::<f32>()) as *const _,
            );
            gl::EnableVertexAttribArray(1);
            gl::BindBuffer(gl::ARRAY_BUFFER, 0);
            gl::BindVertexArray(0);
        }
        Self { vao, vbo }
    }

    pub fn draw(&self) {
        unsafe {
            gl::BindVertexArray(self.vao);
            gl::DrawArrays(gl::TRIANGLE_STRIP, 0, 4);
            gl::BindVertexArray(0);
        }
    }
}

impl Drop for FullscreenQuad {
    fn drop(&mut self) {
        unsafe {
            gl::DeleteVertexArrays(1, &self.vao);
            gl::DeleteBuffers(1, &self.vbo);
        }
    }
}
