//! Texture atlas generation.
//!
//! Batching sprites needs them to share a texture. [`TextureAtlasService`]
//! takes sprites that point at many different textures, works out where
//! each one goes on one or more new textures (using array indices before
//! falling back to extra textures), copies the pixels across and hands back
//! sprites that point at the new layout.
//!
//! The usual flow is [`TextureAtlasService::get_best_fit`] to size the
//! atlas, [`TextureAtlasService::get_sprite_regions`] to place the sprites
//! and [`TextureAtlasService::generate_atlas`] to build the textures.

mod compose;
mod fit;
mod packer;
mod regions;

pub use self::fit::{BestFit, MIN_FIT_SIZE};
pub use self::packer::{Rect, RectPacker};
pub use self::regions::{calculate_regions, Layer, Packing, Page};

use cgmath::Vector2;
use log::*;

use crate::graphics::{Limits, Texture};
use crate::sprite::{Size, Sprite};

/// Smallest texture size the service will generate.
pub const MIN_TEXTURE_SIZE: u32 = 256;
const DEFAULT_TEXTURE_SIZE: u32 = 1024;
const DEFAULT_BASE_NAME: &str = "texture_atlas";

/// Where a sprite lands on the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub texture_index: usize,
    pub region: Rect,
    pub array_index: u32,
}

/// Sprites paired with their placement, ordered by texture, array index and
/// then packing order.
pub type SpriteRegions<'a, T> = Vec<(&'a Sprite<T>, Placement)>;

/// The textures of a generated atlas, and every input sprite paired with
/// its copy on the atlas.
///
/// The textures are owned here and released when this is dropped, unless
/// the caller takes them with [`into_parts`](TextureAtlas::into_parts) or
/// keeps the new sprites (which hold handles of their own) alive.
#[derive(Debug)]
pub struct TextureAtlas<T> {
    textures: Vec<T>,
    sprites: Vec<(Sprite<T>, Sprite<T>)>,
}

impl<T> TextureAtlas<T> {
    pub fn empty() -> TextureAtlas<T> {
        TextureAtlas {
            textures: Vec::new(),
            sprites: Vec::new(),
        }
    }

    pub fn textures(&self) -> &[T] {
        &self.textures
    }

    pub fn sprites(&self) -> &[(Sprite<T>, Sprite<T>)] {
        &self.sprites
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn into_parts(self) -> (Vec<T>, Vec<(Sprite<T>, Sprite<T>)>) {
        (self.textures, self.sprites)
    }
}

/// Builds texture atlases from loose sprites.
///
/// The settings are clamped to the device limits it was created with.
#[derive(Debug, Clone)]
pub struct TextureAtlasService {
    limits: Limits,
    texture_size: Size,
    array_count: u32,
    padding: u32,
    base_texture_name: String,
}

impl TextureAtlasService {
    pub fn new(limits: Limits) -> TextureAtlasService {
        let mut service = TextureAtlasService {
            limits,
            texture_size: Vector2::new(0, 0),
            array_count: 1,
            padding: 0,
            base_texture_name: String::new(),
        };
        service.set_texture_size(Vector2::new(DEFAULT_TEXTURE_SIZE, DEFAULT_TEXTURE_SIZE));
        service.set_array_count(1);
        service
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn texture_size(&self) -> Size {
        self.texture_size
    }

    /// Sets the texture size, limited to the device maximum and no smaller
    /// than `MIN_TEXTURE_SIZE` on either axis.
    pub fn set_texture_size(&mut self, size: Size) {
        self.texture_size = Vector2::new(
            size.x.min(self.limits.max_texture_width).max(MIN_TEXTURE_SIZE),
            size.y.min(self.limits.max_texture_height).max(MIN_TEXTURE_SIZE),
        );
    }

    pub fn with_texture_size(mut self, size: Size) -> Self {
        self.set_texture_size(size);
        self
    }

    pub fn array_count(&self) -> u32 {
        self.array_count
    }

    pub fn set_array_count(&mut self, count: u32) {
        self.array_count = count.max(1).min(self.limits.max_array_count.max(1));
    }

    pub fn with_array_count(mut self, count: u32) -> Self {
        self.set_array_count(count);
        self
    }

    pub fn padding(&self) -> u32 {
        self.padding
    }

    pub fn set_padding(&mut self, padding: u32) {
        self.padding = padding;
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    pub fn base_texture_name(&self) -> &str {
        &self.base_texture_name
    }

    pub fn set_base_texture_name(&mut self, name: impl Into<String>) {
        self.base_texture_name = name.into();
    }

    pub fn with_base_texture_name(mut self, name: impl Into<String>) -> Self {
        self.set_base_texture_name(name);
        self
    }

    pub(crate) fn texture_name(&self, index: usize) -> String {
        let base = self.base_texture_name.trim();
        let base = if base.is_empty() { DEFAULT_BASE_NAME } else { base };
        format!("{}_{}", base, index)
    }

    pub fn calculate_regions<'a, T>(&self, sprites: &'a [Sprite<T>], max_size: Size, max_layers: u32) -> Packing<'a, T>
        where T: Texture
    {
        let refs: Vec<&'a Sprite<T>> = sprites.iter().collect();
        calculate_regions(&refs, max_size, max_layers, self.padding)
    }

    /// Places every usable sprite on the configured texture size and array
    /// count.
    ///
    /// Sprites without a texture or covering no whole pixel are left out. If
    /// the sprites cannot all be placed the result is empty. When they
    /// already share one texture their current regions are returned as-is,
    /// provided that texture fits the configured size and array count.
    pub fn get_sprite_regions<'a, T>(&self, sprites: &'a [Sprite<T>]) -> SpriteRegions<'a, T>
        where T: Texture
    {
        let packing = self.calculate_regions(sprites, self.texture_size, self.array_count);

        if let Packing::AlreadyUnified(ref page) = packing {
            let bounds = Rect::new(0, 0, self.texture_size.x as i32, self.texture_size.y as i32);
            let out_of_range = page.layers.values().any(|layer| {
                layer.array_index >= self.array_count
                    || layer.regions.iter().any(|(_, r)| !bounds.contains(r))
            });
            if out_of_range {
                warn!("Shared texture does not fit a {}x{}x{} atlas", bounds.width, bounds.height, self.array_count);
                return Vec::new();
            }
        }

        let mut regions = Vec::new();
        for (texture_index, page) in packing.into_pages().into_iter().enumerate() {
            for layer in page.layers.into_iter().map(|(_, l)| l) {
                for (sprite, region) in layer.regions {
                    regions.push((sprite, Placement {
                        texture_index,
                        region,
                        array_index: layer.array_index,
                    }));
                }
            }
        }
        regions
    }

    /// Finds the texture size and array count that hold every usable
    /// sprite on a single texture.
    ///
    /// `min_size` is raised to at least `MIN_FIT_SIZE` and `min_layers` to
    /// at least one, both capped by the device limits. Sizes are powers of
    /// two. The result is [`BestFit::NONE`] when there is nothing to pack
    /// or the sprites need more than the largest texture the device
    /// supports, and has zero layers when they need more array indices than
    /// the device has.
    pub fn get_best_fit<T>(&self, sprites: &[Sprite<T>], min_size: Size, min_layers: u32) -> BestFit
        where T: Texture
    {
        let refs: Vec<&Sprite<T>> = sprites.iter().collect();
        fit::best_fit(&refs, min_size, min_layers, self.padding, &self.limits)
    }
}
