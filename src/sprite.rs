//! Sprites and the rectangle types used to address their textures.

use cgmath::{Deg, Vector2};

use crate::atlas::Rect;
use crate::graphics::Texture;

pub type Size = Vector2<u32>;

const EPSILON: f32 = 1e-6;

/// Rectangle in normalized texture coordinates, (0, 0) to (1, 1) covers
/// the whole texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexelRect {
    pub position: Vector2<f32>,
    pub size: Vector2<f32>,
}

impl TexelRect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> TexelRect {
        TexelRect {
            position: Vector2 { x, y },
            size: Vector2 { x: width, y: height },
        }
    }

    pub const fn full() -> TexelRect {
        TexelRect::new(0.0, 0.0, 1.0, 1.0)
    }

    pub fn is_empty(&self) -> bool {
        self.size.x.abs() < EPSILON || self.size.y.abs() < EPSILON
    }
}

/// A textured quad.
///
/// Only the texture fields matter to the atlas code, everything else is
/// copied across untouched when a sprite is moved onto an atlas.
#[derive(Debug, Clone)]
pub struct Sprite<T> {
    pub name: String,
    pub texture: Option<T>,
    pub texture_region: TexelRect,
    pub texture_array_index: u32,

    pub position: Vector2<f32>,
    pub size: Vector2<f32>,
    /// Pivot, relative to the sprite size.
    pub anchor: Vector2<f32>,
    pub angle: Deg<f32>,
    pub color: [f32; 4],
}

impl<T> Sprite<T>
    where T: Texture
{
    /// Creates a sprite covering `region` of `texture`, sized to match the
    /// pixels it covers.
    pub fn new(texture: T, region: TexelRect) -> Sprite<T> {
        let pixels = texture.to_pixel(&region);
        Sprite {
            name: String::new(),
            size: Vector2::new(pixels.width as f32, pixels.height as f32),
            texture: Some(texture),
            texture_region: region,
            texture_array_index: 0,
            position: Vector2::new(0.0, 0.0),
            anchor: Vector2::new(0.0, 0.0),
            angle: Deg(0.0),
            color: [1.0, 1.0, 1.0, 1.0],
        }
    }

    pub fn from_pixels(texture: T, region: Rect) -> Sprite<T> {
        let texel = texture.to_texel(&region);
        Sprite::new(texture, texel)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_array_index(mut self, array_index: u32) -> Self {
        self.texture_array_index = array_index;
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Vector2::new(x, y);
        self
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = color;
        self
    }

    /// Whether the sprite covers at least one pixel of a texture.
    pub fn is_valid(&self) -> bool {
        !self.texture_region.is_empty() && self.pixel_region().map_or(false, |r| !r.is_empty())
    }

    pub fn pixel_region(&self) -> Option<Rect> {
        self.texture.as_ref().map(|t| t.to_pixel(&self.texture_region))
    }

    /// Copy of this sprite pointing at `region` of `texture` instead.
    pub fn relocate(&self, texture: T, region: Rect, array_index: u32) -> Sprite<T> {
        Sprite {
            texture_region: texture.to_texel(&region),
            texture: Some(texture),
            texture_array_index: array_index,
            ..self.clone()
        }
    }
}
