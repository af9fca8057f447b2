use glam::{Mat4, Vec3};
use glow::HasContext;

use super::asset::{LoadedModel, TextureImage, VERTEX_STRIDE};
use super::camera::{ModelSpin, OrbitCamera};
use super::material::{StandardMaterial, TextureRef};
use super::ViewerError;

// ── Lighting ─────────────────────────────────────────────────

/// Soft ambient fill plus one point light up and to the right of the model.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneLights {
    pub ambient_intensity: f32,
    pub point_position: Vec3,
    pub point_intensity: f32,
}

impl Default for SceneLights {
    fn default() -> Self {
        Self {
            ambient_intensity: 0.5,
            point_position: Vec3::new(10.0, 10.0, 10.0),
            point_intensity: 1.0,
        }
    }
}

// ── GPU handles ──────────────────────────────────────────────

struct GpuPrimitive {
    vao: glow::VertexArray,
    vbo: glow::Buffer,
    ibo: glow::Buffer,
    index_count: i32,
    material: usize,
}

/// Texture units, one per material map.
const MAP_UNITS: [(&str, &str); 6] = [
    ("u_map", "u_has_map"),
    ("u_normal_map", "u_has_normal_map"),
    ("u_roughness_map", "u_has_roughness_map"),
    ("u_metalness_map", "u_has_metalness_map"),
    ("u_ao_map", "u_has_ao_map"),
    ("u_emissive_map", "u_has_emissive_map"),
];

pub struct GlRenderer {
    program: glow::Program,
    primitives: Vec<GpuPrimitive>,
    materials: Vec<StandardMaterial>,
    textures: Vec<Option<glow::Texture>>,
}

impl GlRenderer {
    pub fn new(gl: &glow::Context) -> Result<Self, ViewerError> {
        let program = compile_program(gl, MESH_VERT, MESH_FRAG)?;
        Ok(Self {
            program,
            primitives: Vec::new(),
            materials: Vec::new(),
            textures: Vec::new(),
        })
    }

    /// Upload a model to the GPU, replacing the previous one.
    pub fn upload(&mut self, gl: &glow::Context, model: &LoadedModel) -> Result<(), ViewerError> {
        self.clear(gl);

        for image in &model.textures {
            let texture = match image {
                Some(image) => Some(upload_texture(gl, image)?),
                None => None,
            };
            self.textures.push(texture);
        }
        for primitive in &model.primitives {
            let gpu = upload_primitive(gl, &primitive.vertices, &primitive.indices)?;
            self.primitives.push(GpuPrimitive {
                material: primitive.material,
                ..gpu
            });
        }
        self.materials = model.materials.clone();
        Ok(())
    }

    /// Render the scene into a `width` × `height` drawing buffer.
    pub fn paint(
        &self,
        gl: &glow::Context,
        camera: &OrbitCamera,
        spin: &ModelSpin,
        lights: &SceneLights,
        width: i32,
        height: i32,
    ) {
        let aspect = width as f32 / height.max(1) as f32;
        let vp = camera.view_projection(aspect);
        let model = spin.model_matrix();
        let program = self.program;

        unsafe {
            gl.viewport(0, 0, width, height);
            gl.clear_color(0.0, 0.0, 0.0, 0.0);
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
            gl.enable(glow::DEPTH_TEST);
            gl.depth_func(glow::LESS);

            gl.use_program(Some(program));
            set_uniform_mat4(gl, program, "u_view_projection", &vp);
            set_uniform_mat4(gl, program, "u_model", &model);
            set_uniform_vec3(gl, program, "u_camera_position", camera.eye_position());
            set_uniform_vec3(gl, program, "u_ambient", Vec3::splat(lights.ambient_intensity));
            set_uniform_vec3(gl, program, "u_light_position", lights.point_position);
            set_uniform_vec3(gl, program, "u_light_color", Vec3::splat(lights.point_intensity));

            for (unit, (sampler, _)) in MAP_UNITS.iter().enumerate() {
                let loc = gl.get_uniform_location(program, sampler);
                gl.uniform_1_i32(loc.as_ref(), unit as i32);
            }

            for primitive in &self.primitives {
                let Some(material) = self.materials.get(primitive.material) else {
                    continue;
                };
                self.bind_material(gl, material);
                gl.bind_vertex_array(Some(primitive.vao));
                gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(primitive.ibo));
                gl.draw_elements(glow::TRIANGLES, primitive.index_count, glow::UNSIGNED_INT, 0);
                gl.bind_vertex_array(None);
            }

            gl.disable(glow::DEPTH_TEST);
            gl.use_program(None);
        }
    }

    unsafe fn bind_material(&self, gl: &glow::Context, material: &StandardMaterial) {
        let program = self.program;
        let loc = gl.get_uniform_location(program, "u_color");
        let [r, g, b, a] = material.color;
        gl.uniform_4_f32(loc.as_ref(), r, g, b, a);
        set_uniform_f32(gl, program, "u_roughness", material.roughness);
        set_uniform_f32(gl, program, "u_metalness", material.metalness);
        set_uniform_vec3(gl, program, "u_emissive", Vec3::from(material.emissive));
        set_uniform_f32(gl, program, "u_emissive_intensity", material.emissive_intensity);

        let maps = [
            material.map,
            material.normal_map,
            material.roughness_map,
            material.metalness_map,
            material.ao_map,
            material.emissive_map,
        ];
        for (unit, (map, (_, flag))) in maps.iter().zip(MAP_UNITS.iter()).enumerate() {
            let texture = map.and_then(|TextureRef(i)| self.textures.get(i).copied().flatten());
            gl.active_texture(glow::TEXTURE0 + unit as u32);
            gl.bind_texture(glow::TEXTURE_2D, texture);
            let loc = gl.get_uniform_location(program, flag);
            gl.uniform_1_i32(loc.as_ref(), texture.is_some() as i32);
        }
    }

    fn clear(&mut self, gl: &glow::Context) {
        unsafe {
            for primitive in self.primitives.drain(..) {
                gl.delete_vertex_array(primitive.vao);
                gl.delete_buffer(primitive.vbo);
                gl.delete_buffer(primitive.ibo);
            }
            for texture in self.textures.drain(..).flatten() {
                gl.delete_texture(texture);
            }
        }
        self.materials.clear();
    }

    pub fn destroy(&mut self, gl: &glow::Context) {
        self.clear(gl);
        unsafe {
            gl.delete_program(self.program);
        }
    }
}

// ── GPU upload ───────────────────────────────────────────────

fn upload_primitive(gl: &glow::Context, vertices: &[f32], indices: &[u32]) -> Result<GpuPrimitive, ViewerError> {
    unsafe {
        let vao = gl.create_vertex_array().map_err(ViewerError::Gl)?;
        gl.bind_vertex_array(Some(vao));

        let vbo = gl.create_buffer().map_err(ViewerError::Gl)?;
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
        gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, cast_slice(vertices), glow::STATIC_DRAW);

        let stride = (VERTEX_STRIDE * 4) as i32;
        // position: location 0
        gl.enable_vertex_attrib_array(0);
        gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, stride, 0);
        // normal: location 1
        gl.enable_vertex_attrib_array(1);
        gl.vertex_attrib_pointer_f32(1, 3, glow::FLOAT, false, stride, 3 * 4);
        // uv: location 2
        gl.enable_vertex_attrib_array(2);
        gl.vertex_attrib_pointer_f32(2, 2, glow::FLOAT, false, stride, 6 * 4);
        // color: location 3
        gl.enable_vertex_attrib_array(3);
        gl.vertex_attrib_pointer_f32(3, 4, glow::FLOAT, false, stride, 8 * 4);

        let ibo = gl.create_buffer().map_err(ViewerError::Gl)?;
        gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ibo));
        gl.buffer_data_u8_slice(glow::ELEMENT_ARRAY_BUFFER, cast_slice(indices), glow::STATIC_DRAW);

        gl.bind_vertex_array(None);

        Ok(GpuPrimitive {
            vao,
            vbo,
            ibo,
            index_count: indices.len() as i32,
            material: 0,
        })
    }
}

fn upload_texture(gl: &glow::Context, image: &TextureImage) -> Result<glow::Texture, ViewerError> {
    unsafe {
        let texture = gl.create_texture().map_err(ViewerError::Gl)?;
        gl.bind_texture(glow::TEXTURE_2D, Some(texture));
        gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
        gl.tex_image_2d(
            glow::TEXTURE_2D,
            0,
            glow::RGBA8 as i32,
            image.width as i32,
            image.height as i32,
            0,
            glow::RGBA,
            glow::UNSIGNED_BYTE,
            glow::PixelUnpackData::Slice(Some(&image.pixels)),
        );
        gl.generate_mipmap(glow::TEXTURE_2D);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR_MIPMAP_LINEAR as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::REPEAT as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::REPEAT as i32);
        gl.bind_texture(glow::TEXTURE_2D, None);
        Ok(texture)
    }
}

// ── Shader compilation ───────────────────────────────────────

fn compile_program(gl: &glow::Context, vert_src: &str, frag_src: &str) -> Result<glow::Program, ViewerError> {
    unsafe {
        let program = gl.create_program().map_err(ViewerError::Gl)?;
        let mut shaders = Vec::with_capacity(2);

        for (kind, source) in [(glow::VERTEX_SHADER, vert_src), (glow::FRAGMENT_SHADER, frag_src)] {
            let shader = gl.create_shader(kind).map_err(ViewerError::Gl)?;
            gl.shader_source(shader, source);
            gl.compile_shader(shader);
            if !gl.get_shader_compile_status(shader) {
                let log = gl.get_shader_info_log(shader);
                tracing::error!("Shader compile error: {log}");
                return Err(ViewerError::Gl(log));
            }
            gl.attach_shader(program, shader);
            shaders.push(shader);
        }

        gl.link_program(program);
        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            tracing::error!("Program link error: {log}");
            return Err(ViewerError::Gl(log));
        }

        for shader in shaders {
            gl.detach_shader(program, shader);
            gl.delete_shader(shader);
        }

        Ok(program)
    }
}

// ── Uniform setters ──────────────────────────────────────────

fn set_uniform_mat4(gl: &glow::Context, program: glow::Program, name: &str, mat: &Mat4) {
    unsafe {
        let loc = gl.get_uniform_location(program, name);
        gl.uniform_matrix_4_f32_slice(loc.as_ref(), false, &mat.to_cols_array());
    }
}

fn set_uniform_vec3(gl: &glow::Context, program: glow::Program, name: &str, v: Vec3) {
    unsafe {
        let loc = gl.get_uniform_location(program, name);
        gl.uniform_3_f32(loc.as_ref(), v.x, v.y, v.z);
    }
}

fn set_uniform_f32(gl: &glow::Context, program: glow::Program, name: &str, v: f32) {
    unsafe {
        let loc = gl.get_uniform_location(program, name);
        gl.uniform_1_f32(loc.as_ref(), v);
    }
}

// ── Byte cast helper ─────────────────────────────────────────

fn cast_slice<T: Copy>(slice: &[T]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(slice.as_ptr() as *const u8, std::mem::size_of_val(slice)) }
}

// ── Shaders ──────────────────────────────────────────────────

const MESH_VERT: &str = r#"#version 300 es
uniform mat4 u_view_projection;
uniform mat4 u_model;

layout(location = 0) in vec3 a_position;
layout(location = 1) in vec3 a_normal;
layout(location = 2) in vec2 a_uv;
layout(location = 3) in vec4 a_color;

out vec3 v_world;
out vec3 v_normal;
out vec2 v_uv;
out vec4 v_color;

void main() {
    vec4 world = u_model * vec4(a_position, 1.0);
    gl_Position = u_view_projection * world;
    v_world = world.xyz;
    // u_model is a pure rotation
    v_normal = mat3(u_model) * a_normal;
    v_uv = a_uv;
    v_color = a_color;
}
"#;

const MESH_FRAG: &str = r#"#version 300 es
precision highp float;

uniform vec4 u_color;
uniform float u_roughness;
uniform float u_metalness;
uniform vec3 u_emissive;
uniform float u_emissive_intensity;

uniform vec3 u_camera_position;
uniform vec3 u_ambient;
uniform vec3 u_light_position;
uniform vec3 u_light_color;

uniform sampler2D u_map;
uniform sampler2D u_normal_map;
uniform sampler2D u_roughness_map;
uniform sampler2D u_metalness_map;
uniform sampler2D u_ao_map;
uniform sampler2D u_emissive_map;
uniform int u_has_map;
uniform int u_has_normal_map;
uniform int u_has_roughness_map;
uniform int u_has_metalness_map;
uniform int u_has_ao_map;
uniform int u_has_emissive_map;

in vec3 v_world;
in vec3 v_normal;
in vec2 v_uv;
in vec4 v_color;

out vec4 frag_color;

const float PI = 3.14159265359;

vec3 srgb_to_linear(vec3 c) {
    return pow(c, vec3(2.2));
}

vec3 perturb_normal(vec3 n, vec3 p, vec2 uv, vec3 map_n) {
    vec3 dp1 = dFdx(p);
    vec3 dp2 = dFdy(p);
    vec2 duv1 = dFdx(uv);
    vec2 duv2 = dFdy(uv);
    vec3 dp2perp = cross(dp2, n);
    vec3 dp1perp = cross(n, dp1);
    vec3 t = dp2perp * duv1.x + dp1perp * duv2.x;
    vec3 b = dp2perp * duv1.y + dp1perp * duv2.y;
    float scale = inversesqrt(max(max(dot(t, t), dot(b, b)), 1e-12));
    return normalize(mat3(t * scale, b * scale, n) * map_n);
}

float distribution_ggx(float n_dot_h, float roughness) {
    float a = roughness * roughness;
    float a2 = a * a;
    float d = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    return a2 / (PI * d * d);
}

float geometry_smith(float n_dot_v, float n_dot_l, float roughness) {
    float k = (roughness + 1.0) * (roughness + 1.0) / 8.0;
    float gv = n_dot_v / (n_dot_v * (1.0 - k) + k);
    float gl = n_dot_l / (n_dot_l * (1.0 - k) + k);
    return gv * gl;
}

void main() {
    vec4 base = u_color * v_color;
    if (u_has_map == 1) {
        vec4 texel = texture(u_map, v_uv);
        base *= vec4(srgb_to_linear(texel.rgb), texel.a);
    }

    float roughness = u_roughness;
    if (u_has_roughness_map == 1) {
        roughness *= texture(u_roughness_map, v_uv).g;
    }
    roughness = clamp(roughness, 0.04, 1.0);

    float metalness = u_metalness;
    if (u_has_metalness_map == 1) {
        metalness *= texture(u_metalness_map, v_uv).b;
    }
    metalness = clamp(metalness, 0.0, 1.0);

    float occlusion = 1.0;
    if (u_has_ao_map == 1) {
        occlusion = texture(u_ao_map, v_uv).r;
    }

    vec3 n = normalize(v_normal);
    if (!gl_FrontFacing) {
        n = -n;
    }
    if (u_has_normal_map == 1) {
        vec3 map_n = texture(u_normal_map, v_uv).xyz * 2.0 - 1.0;
        n = perturb_normal(n, v_world, v_uv, map_n);
    }

    vec3 v = normalize(u_camera_position - v_world);
    vec3 l = normalize(u_light_position - v_world);
    vec3 h = normalize(v + l);
    float n_dot_v = max(dot(n, v), 1e-4);
    float n_dot_l = max(dot(n, l), 0.0);
    float n_dot_h = max(dot(n, h), 0.0);
    float v_dot_h = max(dot(v, h), 0.0);

    vec3 f0 = mix(vec3(0.04), base.rgb, metalness);
    vec3 fresnel = f0 + (1.0 - f0) * pow(1.0 - v_dot_h, 5.0);
    float d = distribution_ggx(n_dot_h, roughness);
    float g = geometry_smith(n_dot_v, n_dot_l, roughness);
    vec3 specular = fresnel * d * g / (4.0 * n_dot_v * max(n_dot_l, 1e-4));
    vec3 diffuse = (1.0 - fresnel) * (1.0 - metalness) * base.rgb / PI;

    vec3 color = (diffuse + specular) * u_light_color * n_dot_l * PI;
    color += u_ambient * base.rgb * (1.0 - metalness * 0.5) * occlusion;

    vec3 emissive = u_emissive * u_emissive_intensity;
    if (u_has_emissive_map == 1) {
        emissive *= srgb_to_linear(texture(u_emissive_map, v_uv).rgb);
    }
    color += emissive;

    frag_color = vec4(pow(color, vec3(1.0 / 2.2)), base.a);
}
"#;
