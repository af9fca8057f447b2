//! GLB loading.
//!
//! Flattens a binary glTF into draw-ready primitives: node transforms are
//! baked into the vertices, every material is normalized and textures are
//! decoded to RGBA8.

use std::collections::HashMap;

use glam::{Mat3, Mat4, Vec3};
use thiserror::Error;

use super::material::{normalize_material, SourceMaterial, StandardMaterial, TextureRef};

/// Floats per interleaved vertex: position, normal, uv, color.
pub const VERTEX_STRIDE: usize = 12;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Invalid model file: {0}")]
    Parse(#[from] gltf::Error),

    #[error("Model has no scene")]
    NoScene,

    #[error("Model contains no triangle meshes")]
    Empty,
}

/// One drawable piece of the model in world space.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    /// Interleaved `[px, py, pz, nx, ny, nz, u, v, r, g, b, a]`.
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    /// Index into [`LoadedModel::materials`].
    pub material: usize,
}

impl Primitive {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }

    pub fn position(&self, vertex: usize) -> [f32; 3] {
        let base = vertex * VERTEX_STRIDE;
        [self.vertices[base], self.vertices[base + 1], self.vertices[base + 2]]
    }

    pub fn normal(&self, vertex: usize) -> [f32; 3] {
        let base = vertex * VERTEX_STRIDE + 3;
        [self.vertices[base], self.vertices[base + 1], self.vertices[base + 2]]
    }
}

/// Decoded RGBA8 texture image.
#[derive(Clone, PartialEq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl std::fmt::Debug for TextureImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModel {
    pub primitives: Vec<Primitive>,
    pub materials: Vec<StandardMaterial>,
    /// Indexed by [`TextureRef`]. `None` for formats that could not be
    /// converted.
    pub textures: Vec<Option<TextureImage>>,
}

impl LoadedModel {
    pub fn texture(&self, texture: TextureRef) -> Option<&TextureImage> {
        self.textures.get(texture.0).and_then(Option::as_ref)
    }
}

pub fn load_glb(bytes: &[u8]) -> Result<LoadedModel, AssetError> {
    let (document, buffers, images) = gltf::import_slice(bytes)?;
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or(AssetError::NoScene)?;

    let mut loader = Loader {
        buffers: &buffers,
        primitives: Vec::new(),
        materials: Vec::new(),
        material_slots: HashMap::new(),
    };
    for node in scene.nodes() {
        loader.visit(&node, Mat4::IDENTITY);
    }

    if loader.primitives.is_empty() {
        return Err(AssetError::Empty);
    }

    let textures = images.iter().map(to_rgba8).collect();
    tracing::debug!(
        "Loaded model: {} primitives, {} materials",
        loader.primitives.len(),
        loader.materials.len()
    );

    Ok(LoadedModel {
        primitives: loader.primitives,
        materials: loader.materials,
        textures,
    })
}

struct Loader<'a> {
    buffers: &'a [gltf::buffer::Data],
    primitives: Vec<Primitive>,
    materials: Vec<StandardMaterial>,
    /// glTF material index (None for the default material) → slot.
    material_slots: HashMap<Option<usize>, usize>,
}

impl Loader<'_> {
    fn visit(&mut self, node: &gltf::Node<'_>, parent: Mat4) {
        let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

        if let Some(mesh) = node.mesh() {
            for primitive in mesh.primitives() {
                if primitive.mode() != gltf::mesh::Mode::Triangles {
                    tracing::warn!("Skipping non-triangle primitive in mesh {:?}", mesh.name());
                    continue;
                }
                if let Some(loaded) = self.primitive(&primitive, world) {
                    self.primitives.push(loaded);
                }
            }
        }

        for child in node.children() {
            self.visit(&child, world);
        }
    }

    fn primitive(&mut self, primitive: &gltf::Primitive<'_>, world: Mat4) -> Option<Primitive> {
        let buffers = self.buffers;
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));

        let positions: Vec<Vec3> = reader
            .read_positions()?
            .map(|p| world.transform_point3(Vec3::from(p)))
            .collect();
        if positions.is_empty() {
            return None;
        }

        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };

        let normal_matrix = Mat3::from_mat4(world).inverse().transpose();
        let normals: Vec<Vec3> = match reader.read_normals() {
            Some(normals) => normals
                .map(|n| (normal_matrix * Vec3::from(n)).normalize_or_zero())
                .collect(),
            None => compute_normals(&positions, &indices),
        };
        let uvs: Vec<[f32; 2]> = reader
            .read_tex_coords(0)
            .map(|uvs| uvs.into_f32().collect())
            .unwrap_or_default();
        let colors: Vec<[f32; 4]> = reader
            .read_colors(0)
            .map(|colors| colors.into_rgba_f32().collect())
            .unwrap_or_default();

        let mut vertices = Vec::with_capacity(positions.len() * VERTEX_STRIDE);
        for (i, position) in positions.iter().enumerate() {
            let normal = normals.get(i).copied().unwrap_or(Vec3::Z);
            let uv = uvs.get(i).copied().unwrap_or([0.0, 0.0]);
            let color = colors.get(i).copied().unwrap_or([1.0; 4]);
            vertices.extend_from_slice(&position.to_array());
            vertices.extend_from_slice(&normal.to_array());
            vertices.extend_from_slice(&uv);
            vertices.extend_from_slice(&color);
        }

        Some(Primitive {
            vertices,
            indices,
            material: self.material_slot(&primitive.material()),
        })
    }

    fn material_slot(&mut self, material: &gltf::Material<'_>) -> usize {
        if let Some(slot) = self.material_slots.get(&material.index()) {
            return *slot;
        }
        let slot = self.materials.len();
        self.materials.push(normalize_material(&source_material(material)));
        self.material_slots.insert(material.index(), slot);
        slot
    }
}

/// Read what the glTF material defines. Unlit and specular-glossiness
/// materials carry no metal/roughness values.
pub fn source_material(material: &gltf::Material<'_>) -> SourceMaterial {
    let texture = |info: Option<gltf::texture::Info<'_>>| info.map(|i| TextureRef(i.texture().source().index()));
    let pbr = material.pbr_metallic_roughness();
    let metallic_roughness = texture(pbr.metallic_roughness_texture());

    let mut source = SourceMaterial {
        name: material.name().map(str::to_string),
        color: Some(pbr.base_color_factor()),
        map: texture(pbr.base_color_texture()),
        normal_map: material
            .normal_texture()
            .map(|t| TextureRef(t.texture().source().index())),
        ao_map: material
            .occlusion_texture()
            .map(|t| TextureRef(t.texture().source().index())),
        emissive_map: texture(material.emissive_texture()),
        emissive: Some(material.emissive_factor()),
        emissive_intensity: material.emissive_strength(),
        ..SourceMaterial::default()
    };

    if let Some(spec_gloss) = material.pbr_specular_glossiness() {
        source.color = Some(spec_gloss.diffuse_factor());
        source.map = texture(spec_gloss.diffuse_texture());
    } else if !material.unlit() {
        source.roughness = Some(pbr.roughness_factor());
        source.metalness = Some(pbr.metallic_factor());
        source.roughness_map = metallic_roughness;
        source.metalness_map = metallic_roughness;
    }

    source
}

/// Area-weighted vertex normals.
fn compute_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0] as usize, triangle[1] as usize, triangle[2] as usize];
        let (Some(pa), Some(pb), Some(pc)) = (positions.get(a), positions.get(b), positions.get(c)) else {
            continue;
        };
        let face = (*pb - *pa).cross(*pc - *pa);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    normals.iter().map(|n| n.normalize_or(Vec3::Z)).collect()
}

fn to_rgba8(image: &gltf::image::Data) -> Option<TextureImage> {
    use gltf::image::Format;

    let (channels, bytes_per_channel) = match image.format {
        Format::R8 => (1, 1),
        Format::R8G8 => (2, 1),
        Format::R8G8B8 => (3, 1),
        Format::R8G8B8A8 => (4, 1),
        Format::R16 => (1, 2),
        Format::R16G16 => (2, 2),
        Format::R16G16B16 => (3, 2),
        Format::R16G16B16A16 => (4, 2),
        Format::R32G32B32FLOAT => (3, 4),
        Format::R32G32B32A32FLOAT => (4, 4),
    };

    let texel_size = channels * bytes_per_channel;
    let expected = image.width as usize * image.height as usize * texel_size;
    if image.pixels.len() < expected {
        tracing::warn!("Texture data shorter than {}x{}", image.width, image.height);
        return None;
    }

    let channel = |bytes: &[u8]| -> u8 {
        match bytes_per_channel {
            1 => bytes[0],
            2 => (u16::from_ne_bytes([bytes[0], bytes[1]]) >> 8) as u8,
            _ => {
                let value = f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                (value.clamp(0.0, 1.0) * 255.0).round() as u8
            }
        }
    };

    let mut pixels = Vec::with_capacity(image.width as usize * image.height as usize * 4);
    for texel in image.pixels[..expected].chunks_exact(texel_size) {
        let mut rgba = [0, 0, 0, 255];
        for (c, value) in texel.chunks_exact(bytes_per_channel).enumerate() {
            rgba[c] = channel(value);
        }
        // Single channel images are grey.
        if channels == 1 {
            rgba[1] = rgba[0];
            rgba[2] = rgba[0];
        }
        pixels.extend_from_slice(&rgba);
    }

    Some(TextureImage {
        width: image.width,
        height: image.height,
        pixels,
    })
}
