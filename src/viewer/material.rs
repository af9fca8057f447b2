//! Material normalization.
//!
//! Loaded assets may author materials in different shading models. Before
//! rendering, every material is mapped onto one metal/roughness
//! representation so the viewport lighting treats them all the same way.

pub const DEFAULT_ROUGHNESS: f32 = 0.5;
pub const DEFAULT_METALNESS: f32 = 0.5;
pub const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Index into the asset's texture list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureRef(pub usize);

/// What a source material may provide, independent of the loader's
/// native material types. `None` means the source does not define it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMaterial {
    pub name: Option<String>,
    /// Linear RGBA.
    pub color: Option<[f32; 4]>,
    pub roughness: Option<f32>,
    pub metalness: Option<f32>,
    pub map: Option<TextureRef>,
    pub normal_map: Option<TextureRef>,
    pub roughness_map: Option<TextureRef>,
    pub metalness_map: Option<TextureRef>,
    pub ao_map: Option<TextureRef>,
    pub emissive_map: Option<TextureRef>,
    pub emissive: Option<[f32; 3]>,
    pub emissive_intensity: Option<f32>,
}

/// Physically based metal/roughness material used for every mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardMaterial {
    pub name: Option<String>,
    pub color: [f32; 4],
    pub roughness: f32,
    pub metalness: f32,
    pub map: Option<TextureRef>,
    pub normal_map: Option<TextureRef>,
    pub roughness_map: Option<TextureRef>,
    pub metalness_map: Option<TextureRef>,
    pub ao_map: Option<TextureRef>,
    pub emissive_map: Option<TextureRef>,
    pub emissive: [f32; 3],
    pub emissive_intensity: f32,
}

impl Default for StandardMaterial {
    fn default() -> Self {
        Self {
            name: None,
            color: WHITE,
            roughness: 1.0,
            metalness: 0.0,
            map: None,
            normal_map: None,
            roughness_map: None,
            metalness_map: None,
            ao_map: None,
            emissive_map: None,
            emissive: [0.0; 3],
            emissive_intensity: 1.0,
        }
    }
}

impl StandardMaterial {
    /// Every texture this material samples.
    pub fn textures(&self) -> impl Iterator<Item = TextureRef> + '_ {
        [
            self.map,
            self.normal_map,
            self.roughness_map,
            self.metalness_map,
            self.ao_map,
            self.emissive_map,
        ]
        .into_iter()
        .flatten()
    }
}

/// Map a source material onto the standard representation.
pub fn normalize_material(source: &SourceMaterial) -> StandardMaterial {
    let mut material = StandardMaterial {
        name: source.name.clone(),
        color: source.color.unwrap_or(WHITE),
        roughness: source.roughness.unwrap_or(DEFAULT_ROUGHNESS),
        metalness: source.metalness.unwrap_or(DEFAULT_METALNESS),
        map: source.map,
        normal_map: source.normal_map,
        roughness_map: source.roughness_map,
        metalness_map: source.metalness_map,
        ao_map: source.ao_map,
        emissive_map: source.emissive_map,
        ..StandardMaterial::default()
    };

    if let Some(emissive) = source.emissive {
        material.emissive = emissive;
    }
    // Zero intensity keeps the default of 1.
    if let Some(intensity) = source.emissive_intensity.filter(|i| *i != 0.0) {
        material.emissive_intensity = intensity;
    }

    material
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_roughness_and_metalness_default_to_half() {
        let material = normalize_material(&SourceMaterial::default());
        assert_eq!(material.roughness, 0.5);
        assert_eq!(material.metalness, 0.5);
        assert_eq!(material.color, WHITE);
        assert_eq!(material.emissive, [0.0; 3]);
        assert_eq!(material.emissive_intensity, 1.0);
        assert_eq!(material.textures().count(), 0);
    }

    #[test]
    fn test_defined_values_are_copied() {
        let source = SourceMaterial {
            name: Some("skin".to_string()),
            color: Some([0.2, 0.4, 0.6, 0.8]),
            roughness: Some(0.0),
            metalness: Some(1.0),
            emissive: Some([1.0, 0.5, 0.0]),
            emissive_intensity: Some(3.0),
            ..SourceMaterial::default()
        };
        let material = normalize_material(&source);

        assert_eq!(material.name.as_deref(), Some("skin"));
        assert_eq!(material.color, [0.2, 0.4, 0.6, 0.8]);
        assert_eq!(material.roughness, 0.0);
        assert_eq!(material.metalness, 1.0);
        assert_eq!(material.emissive, [1.0, 0.5, 0.0]);
        assert_eq!(material.emissive_intensity, 3.0);
    }

    #[test]
    fn test_texture_maps_are_carried_over() {
        let source = SourceMaterial {
            map: Some(TextureRef(0)),
            normal_map: Some(TextureRef(1)),
            roughness_map: Some(TextureRef(2)),
            metalness_map: Some(TextureRef(2)),
            ao_map: Some(TextureRef(3)),
            emissive_map: Some(TextureRef(4)),
            ..SourceMaterial::default()
        };
        let material = normalize_material(&source);

        assert_eq!(material.map, Some(TextureRef(0)));
        assert_eq!(material.normal_map, Some(TextureRef(1)));
        assert_eq!(material.roughness_map, Some(TextureRef(2)));
        assert_eq!(material.metalness_map, Some(TextureRef(2)));
        assert_eq!(material.ao_map, Some(TextureRef(3)));
        assert_eq!(material.emissive_map, Some(TextureRef(4)));
        assert_eq!(material.textures().count(), 6);
    }

    #[test]
    fn test_zero_emissive_intensity_keeps_default() {
        let source = SourceMaterial {
            emissive_intensity: Some(0.0),
            ..SourceMaterial::default()
        };
        assert_eq!(normalize_material(&source).emissive_intensity, 1.0);
    }
}
