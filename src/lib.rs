//! Packs loose sprites onto shared texture atlases.
//!
//! See [`atlas::TextureAtlasService`] for the entry points and
//! [`graphics::Graphics`] for what a back end has to provide.

#[macro_use]
extern crate error_chain;

pub mod atlas;
pub mod error;
pub mod graphics;
pub mod sprite;

pub use crate::atlas::{BestFit, Packing, Placement, Rect, SpriteRegions, TextureAtlas, TextureAtlasService};
pub use crate::graphics::{Format, Graphics, Limits, Texture};
pub use crate::sprite::{Size, Sprite, TexelRect};
