use log::*;

use super::{SpriteRegions, TextureAtlas, TextureAtlasService};
use crate::error::{self, ErrorKind, ResultExt};
use crate::graphics::{Blit, Format, Graphics, Texture, TextureInfo};

const TRANSPARENT: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

/// Render target views opened while drawing an atlas.
///
/// Each (texture, array index) gets one view, cleared the first time it is
/// opened. Dropping the scope puts back whatever target was bound before
/// and releases every view, whether drawing finished or not.
struct TargetScope<'g, G: Graphics> {
    graphics: &'g mut G,
    original: Option<G::Target>,
    views: Vec<((usize, u32), G::Target)>,
}

impl<'g, G: Graphics> TargetScope<'g, G> {
    fn new(graphics: &'g mut G) -> TargetScope<'g, G> {
        let original = graphics.render_target();
        TargetScope {
            graphics,
            original,
            views: Vec::new(),
        }
    }

    fn bind(&mut self, texture: &G::Texture, texture_index: usize, array_index: u32) -> error::Result<()> {
        let key = (texture_index, array_index);
        let existing = self.views.iter().position(|&(k, _)| k == key);
        let idx = match existing {
            Some(idx) => idx,
            None => {
                let view = self.graphics.render_target_view(texture, array_index)?;
                let idx = self.views.len();
                self.views.push((key, view));
                self.graphics.clear(&self.views[idx].1, TRANSPARENT)?;
                idx
            }
        };
        let view = &self.views[idx].1;
        self.graphics.set_render_target(Some(view));
        Ok(())
    }
}

impl<'g, G: Graphics> Drop for TargetScope<'g, G> {
    fn drop(&mut self) {
        self.graphics.set_render_target(self.original.as_ref());
        for (_, view) in self.views.drain(..) {
            self.graphics.release_target(view);
        }
    }
}

impl TextureAtlasService {
    /// Creates the atlas textures and copies every sprite onto them.
    ///
    /// `regions` normally comes from
    /// [`get_sprite_regions`](TextureAtlasService::get_sprite_regions). One
    /// texture of the configured size and array count is created for each
    /// texture index used. `format` has to be usable as a render target,
    /// otherwise nothing is created and an `UnsupportedFormat` error is
    /// returned.
    ///
    /// The render target bound on entry is bound again on return. If
    /// anything fails, the textures created so far are released before the
    /// error is returned.
    pub fn generate_atlas<'a, G>(
        &self,
        graphics: &mut G,
        regions: &SpriteRegions<'a, G::Texture>,
        format: Format,
    ) -> error::Result<TextureAtlas<G::Texture>>
        where G: Graphics
    {
        if format == Format::Unknown || !graphics.supports_render_target(format) {
            warn!("Refusing to build an atlas in {:?}", format);
            bail!(ErrorKind::UnsupportedFormat(format));
        }

        if regions.is_empty() {
            return Ok(TextureAtlas::empty());
        }

        if let Some((_, placement)) = regions.iter().find(|(_, p)| p.array_index >= self.array_count) {
            bail!(ErrorKind::InvalidArrayIndex(placement.array_index, self.array_count));
        }
        if let Some((sprite, _)) = regions.iter().find(|(s, _)| s.texture.is_none()) {
            bail!(ErrorKind::MissingTexture(sprite.name.clone()));
        }

        let texture_count = regions.iter()
            .map(|(_, p)| p.texture_index)
            .max()
            .map_or(0, |max| max + 1);

        let mut textures = Vec::with_capacity(texture_count);
        for texture_index in 0 .. texture_count {
            let info = TextureInfo::new(
                self.texture_name(texture_index),
                self.texture_size.x,
                self.texture_size.y,
                format,
            )
                .with_array_count(self.array_count)
                .with_render_target(true);
            let texture = graphics.create_texture(&info)
                .chain_err(|| ErrorKind::TextureCreation(info.name.clone()))?;
            textures.push(texture);
        }

        let mut sprites = Vec::with_capacity(regions.len());
        {
            let mut scope = TargetScope::new(graphics);

            for &(sprite, placement) in regions {
                let source = match sprite.texture {
                    Some(ref texture) => texture,
                    None => bail!(ErrorKind::MissingTexture(sprite.name.clone())),
                };
                let texture = &textures[placement.texture_index];

                scope.bind(texture, placement.texture_index, placement.array_index)
                    .chain_err(|| format!("could not bind '{}' index {}", texture.name(), placement.array_index))?;
                scope.graphics.blit(&Blit {
                    texture: source,
                    source: source.to_pixel(&sprite.texture_region),
                    array_index: sprite.texture_array_index,
                    destination: placement.region,
                })
                    .chain_err(|| format!("could not copy sprite '{}' from '{}'", sprite.name, source.name()))?;

                trace!(
                    "Sprite '{}' -> '{}' {:?} index {}",
                    sprite.name, texture.name(), placement.region, placement.array_index
                );
                sprites.push((
                    sprite.clone(),
                    sprite.relocate(texture.clone(), placement.region, placement.array_index),
                ));
            }
        }

        debug!("Generated {} atlas texture(s) holding {} sprites", textures.len(), sprites.len());
        Ok(TextureAtlas { textures, sprites })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{Placement, Rect};
    use crate::graphics::soft::{SoftGraphics, SoftTexture};
    use crate::sprite::Sprite;
    use cgmath::Vector2;

    fn solid(graphics: &mut SoftGraphics, w: u32, h: u32, rgba: [u8; 4]) -> Sprite<SoftTexture> {
        let tex = graphics
            .create_texture(&TextureInfo::new("src", w, h, Format::R8G8B8A8Unorm))
            .unwrap();
        tex.fill(0, Rect::new(0, 0, w as i32, h as i32), rgba).unwrap();
        Sprite::from_pixels(tex, Rect::new(0, 0, w as i32, h as i32))
    }

    fn service() -> TextureAtlasService {
        TextureAtlasService::new(Default::default()).with_texture_size(Vector2::new(256, 256))
    }

    #[test]
    fn test_unsupported_format_allocates_nothing() {
        let mut graphics = SoftGraphics::new();
        let list = vec![solid(&mut graphics, 8, 8, [1, 2, 3, 4])];
        let before = graphics.allocated_bytes();
        let regions = service().get_sprite_regions(&list);

        for &format in &[Format::Unknown, Format::Bc3Unorm, Format::D32Float] {
            let err = service().generate_atlas(&mut graphics, &regions, format).unwrap_err();
            match *err.kind() {
                ErrorKind::UnsupportedFormat(f) => assert_eq!(f, format),
                ref other => panic!("unexpected error {:?}", other),
            }
        }
        assert_eq!(graphics.allocated_bytes(), before);
    }

    #[test]
    fn test_empty_regions_give_empty_atlas() {
        let mut graphics = SoftGraphics::new();
        let regions: SpriteRegions<'_, SoftTexture> = Vec::new();
        let atlas = service()
            .generate_atlas(&mut graphics, &regions, Format::R8G8B8A8Unorm)
            .unwrap();
        assert!(atlas.is_empty());
        assert!(atlas.sprites().is_empty());
        assert_eq!(graphics.allocated_bytes(), 0);
    }

    #[test]
    fn test_array_index_out_of_range() {
        let mut graphics = SoftGraphics::new();
        let sprite = solid(&mut graphics, 8, 8, [1, 2, 3, 4]);
        let regions = vec![(&sprite, Placement {
            texture_index: 0,
            region: Rect::new(0, 0, 8, 8),
            array_index: 1,
        })];
        let before = graphics.allocated_bytes();
        let err = service()
            .generate_atlas(&mut graphics, &regions, Format::R8G8B8A8Unorm)
            .unwrap_err();
        match *err.kind() {
            ErrorKind::InvalidArrayIndex(1, 1) => {}
            ref other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(graphics.allocated_bytes(), before);
    }

    #[test]
    fn test_untextured_sprite_is_rejected() {
        let mut graphics = SoftGraphics::new();
        let sprite = solid(&mut graphics, 8, 8, [1, 2, 3, 4]).with_name("textured");
        let mut blank = sprite.clone().with_name("blank");
        blank.texture = None;
        let regions = vec![
            (&sprite, Placement { texture_index: 0, region: Rect::new(0, 0, 8, 8), array_index: 0 }),
            (&blank, Placement { texture_index: 0, region: Rect::new(8, 0, 8, 8), array_index: 0 }),
        ];
        let before = graphics.allocated_bytes();

        let err = service()
            .generate_atlas(&mut graphics, &regions, Format::R8G8B8A8Unorm)
            .unwrap_err();
        match *err.kind() {
            ErrorKind::MissingTexture(ref name) => assert_eq!(name, "blank"),
            ref other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(graphics.allocated_bytes(), before);
        assert_eq!(graphics.live_targets(), 0);
    }

    #[test]
    fn test_pixels_and_layers() {
        let mut graphics = SoftGraphics::new();
        let list = vec![
            solid(&mut graphics, 200, 200, [255, 0, 0, 255]),
            solid(&mut graphics, 200, 100, [0, 255, 0, 255]),
            solid(&mut graphics, 20, 20, [0, 0, 255, 255]),
        ];
        let service = service().with_array_count(2);
        let regions = service.get_sprite_regions(&list);
        assert_eq!(regions.len(), 3);

        let atlas = service.generate_atlas(&mut graphics, &regions, Format::B8G8R8A8Unorm).unwrap();
        assert_eq!(atlas.textures().len(), 1);
        let canvas = &atlas.textures()[0];
        assert_eq!(canvas.name(), "texture_atlas_0");
        assert_eq!(canvas.array_count(), 2);

        for (original, moved) in atlas.sprites() {
            let placement = regions.iter().find(|(s, _)| s.name == original.name && s.size == original.size).unwrap().1;
            assert_eq!(moved.texture.as_ref(), Some(canvas));
            assert_eq!(moved.texture_array_index, placement.array_index);
            assert_eq!(moved.pixel_region(), Some(placement.region));

            let expected = original.texture.as_ref().unwrap().read_pixel(0, 0, 0).unwrap();
            let r = placement.region;
            assert_eq!(canvas.read_pixel(placement.array_index, r.x, r.y), Some(expected));
            assert_eq!(canvas.read_pixel(placement.array_index, r.right() - 1, r.bottom() - 1), Some(expected));
        }

        // Untouched pixels were cleared to transparent black.
        assert_eq!(canvas.read_pixel(0, 255, 255), Some([0, 0, 0, 0]));
        assert_eq!(canvas.read_pixel(1, 255, 255), Some([0, 0, 0, 0]));
        assert_eq!(graphics.live_targets(), 0);
    }

    #[test]
    fn test_restores_previous_target() {
        let mut graphics = SoftGraphics::new();
        let screen = graphics
            .create_texture(&TextureInfo::new("screen", 64, 64, Format::R8G8B8A8Unorm).with_render_target(true))
            .unwrap();
        let view = graphics.render_target_view(&screen, 0).unwrap();
        graphics.set_render_target(Some(&view));

        let list = vec![
            solid(&mut graphics, 16, 16, [9, 9, 9, 255]),
            solid(&mut graphics, 32, 16, [7, 7, 7, 255]),
        ];
        let regions = service().get_sprite_regions(&list);
        let atlas = service().generate_atlas(&mut graphics, &regions, Format::R8G8B8A8Unorm).unwrap();

        assert_eq!(atlas.sprites().len(), 2);
        assert_eq!(graphics.render_target(), Some(view.clone()));
        assert_eq!(graphics.live_targets(), 1);
        assert_eq!(screen.read_pixel(0, 0, 0), Some([0, 0, 0, 0]));
        graphics.release_target(view);
    }

    #[test]
    fn test_allocation_failure_releases_textures() {
        let list_graphics = &mut SoftGraphics::new();
        let list: Vec<_> = (0..3).map(|i| solid(list_graphics, 200, 200, [i, i, i, 255])).collect();
        let service = service();
        let regions = service.get_sprite_regions(&list);
        assert_eq!(regions.iter().map(|(_, p)| p.texture_index).max(), Some(2));

        // Room for two 256x256 textures but not a third.
        let mut graphics = SoftGraphics::new().with_memory_budget(2 * 256 * 1024);
        let err = service
            .generate_atlas(&mut graphics, &regions, Format::R8G8B8A8Unorm)
            .unwrap_err();
        match *err.kind() {
            ErrorKind::TextureCreation(ref name) => assert_eq!(name, "texture_atlas_2"),
            ref other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(graphics.allocated_bytes(), 0);
        assert_eq!(graphics.live_targets(), 0);
    }

    #[test]
    fn test_blit_failure_unwinds() {
        let mut graphics = SoftGraphics::new();
        let good = solid(&mut graphics, 16, 16, [1, 1, 1, 255]);
        let mut bad = solid(&mut graphics, 16, 16, [2, 2, 2, 255]);
        // Points at an array index the source texture does not have.
        bad.texture_array_index = 3;
        let list = vec![good, bad];

        let service = service();
        let regions = service.get_sprite_regions(&list);
        assert_eq!(regions.len(), 2);
        let before = graphics.allocated_bytes();

        assert!(service.generate_atlas(&mut graphics, &regions, Format::R8G8B8A8Unorm).is_err());
        assert_eq!(graphics.allocated_bytes(), before);
        assert_eq!(graphics.live_targets(), 0);
        assert!(graphics.render_target().is_none());
    }
}
