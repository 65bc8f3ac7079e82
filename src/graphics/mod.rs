//! The slice of a graphics device the atlas code needs.
//!
//! A back end provides textures that can be drawn from and rendered into,
//! a way to bind one array layer of a texture as the render target, and a
//! point-sampled copy into the bound target.

pub mod soft;

use crate::atlas::Rect;
use crate::error;
use crate::sprite::TexelRect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Unknown,
    R8G8B8A8Unorm,
    R8G8B8A8UnormSrgb,
    B8G8R8A8Unorm,
    B8G8R8A8UnormSrgb,
    R16G16B16A16Float,
    Bc3Unorm,
    D32Float,
}

impl Format {
    /// Bytes per pixel, block compressed formats report zero.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Format::Unknown | Format::Bc3Unorm => 0,
            Format::R8G8B8A8Unorm
            | Format::R8G8B8A8UnormSrgb
            | Format::B8G8R8A8Unorm
            | Format::B8G8R8A8UnormSrgb
            | Format::D32Float => 4,
            Format::R16G16B16A16Float => 8,
        }
    }
}

/// Device limits that bound the size of an atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_texture_width: u32,
    pub max_texture_height: u32,
    pub max_array_count: u32,
}

impl Default for Limits {
    fn default() -> Limits {
        Limits {
            max_texture_width: 16384,
            max_texture_height: 16384,
            max_array_count: 2048,
        }
    }
}

/// Identity of a texture, shared by every handle to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// Handle to a 2D texture (array).
///
/// Handles are cheap to clone. The underlying resource is released when
/// the last handle is dropped.
pub trait Texture: Clone {
    fn id(&self) -> TextureId;
    fn name(&self) -> &str;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn array_count(&self) -> u32;
    fn format(&self) -> Format;

    /// Converts normalized coordinates to pixels on this texture.
    fn to_pixel(&self, region: &TexelRect) -> Rect {
        let w = self.width() as f32;
        let h = self.height() as f32;
        Rect {
            x: (region.position.x * w).round() as i32,
            y: (region.position.y * h).round() as i32,
            width: (region.size.x * w).round() as i32,
            height: (region.size.y * h).round() as i32,
        }
    }

    fn to_texel(&self, rect: &Rect) -> TexelRect {
        let w = self.width() as f32;
        let h = self.height() as f32;
        TexelRect::new(
            rect.x as f32 / w,
            rect.y as f32 / h,
            rect.width as f32 / w,
            rect.height as f32 / h,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub array_count: u32,
    pub format: Format,
    /// Whether the texture will be bound as a render target.
    pub render_target: bool,
}

impl TextureInfo {
    pub fn new(name: impl Into<String>, width: u32, height: u32, format: Format) -> TextureInfo {
        TextureInfo {
            name: name.into(),
            width,
            height,
            array_count: 1,
            format,
            render_target: false,
        }
    }

    pub fn with_array_count(mut self, array_count: u32) -> Self {
        self.array_count = array_count;
        self
    }

    pub fn with_render_target(mut self, render_target: bool) -> Self {
        self.render_target = render_target;
        self
    }
}

/// A point sampled copy into the bound render target.
#[derive(Debug, Clone, Copy)]
pub struct Blit<'a, T> {
    pub texture: &'a T,
    pub source: Rect,
    pub array_index: u32,
    pub destination: Rect,
}

pub trait Graphics {
    type Texture: Texture;
    /// A single array layer of a texture bound for rendering.
    type Target: Clone;

    fn limits(&self) -> &Limits;

    fn supports_render_target(&self, format: Format) -> bool;

    fn create_texture(&mut self, info: &TextureInfo) -> error::Result<Self::Texture>;

    fn render_target_view(&mut self, texture: &Self::Texture, array_index: u32) -> error::Result<Self::Target>;

    fn render_target(&self) -> Option<Self::Target>;

    fn set_render_target(&mut self, target: Option<&Self::Target>);

    fn clear(&mut self, target: &Self::Target, color: [f32; 4]) -> error::Result<()>;

    fn blit(&mut self, blit: &Blit<'_, Self::Texture>) -> error::Result<()>;

    fn release_target(&mut self, target: Self::Target);
}
