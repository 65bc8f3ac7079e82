//! Splits a set of sprites across atlas pages and array layers.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::slice;

use log::*;

use super::packer::{Rect, RectPacker};
use crate::graphics::Texture;
use crate::sprite::{Size, Sprite};

/// The sprites packed onto one array index of a page.
#[derive(Debug)]
pub struct Layer<'a, T> {
    pub array_index: u32,
    /// Area the regions were packed into.
    pub bounds: Rect,
    /// Packed sprites with their pixel regions, padding already removed.
    pub regions: Vec<(&'a Sprite<T>, Rect)>,
}

/// One destination texture.
#[derive(Debug)]
pub struct Page<'a, T> {
    pub layers: BTreeMap<u32, Layer<'a, T>>,
}

impl<'a, T> Page<'a, T> {
    fn new() -> Page<'a, T> {
        Page {
            layers: BTreeMap::new(),
        }
    }

    pub fn sprite_count(&self) -> usize {
        self.layers.values().map(|l| l.regions.len()).sum()
    }
}

/// Outcome of [`calculate_regions`].
#[derive(Debug)]
pub enum Packing<'a, T> {
    /// The sprites were packed into new pages. Empty when they could not
    /// all be made to fit.
    Packed(Vec<Page<'a, T>>),
    /// The sprites already share a single texture. The page describes that
    /// texture with every sprite at its current region and array index.
    AlreadyUnified(Page<'a, T>),
}

impl<'a, T> Packing<'a, T> {
    pub fn pages(&self) -> &[Page<'a, T>] {
        match *self {
            Packing::Packed(ref pages) => pages,
            Packing::AlreadyUnified(ref page) => slice::from_ref(page),
        }
    }

    pub fn into_pages(self) -> Vec<Page<'a, T>> {
        match self {
            Packing::Packed(pages) => pages,
            Packing::AlreadyUnified(page) => vec![page],
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages().is_empty()
    }

    pub fn is_unchanged(&self) -> bool {
        match *self {
            Packing::AlreadyUnified(_) => true,
            Packing::Packed(_) => false,
        }
    }
}

type Worklist<'a, T> = Vec<(&'a Sprite<T>, Rect)>;

/// Works out where every sprite goes on a set of `max_size` pages with
/// `max_layers` array indices each.
///
/// Sprites without a texture or covering no whole pixel are skipped. Sprites
/// that all share one texture are left where they are. Otherwise the
/// padded regions are packed tallest first, spilling onto the next array
/// index and then the next page. If any single sprite cannot fit on an
/// empty page nothing is packed at all.
pub fn calculate_regions<'a, T>(
    sprites: &[&'a Sprite<T>],
    max_size: Size,
    max_layers: u32,
    padding: u32,
) -> Packing<'a, T>
    where T: Texture
{
    let sprites: Vec<(&'a Sprite<T>, &T)> = sprites.iter()
        .filter(|s| s.is_valid())
        .filter_map(|&s| s.texture.as_ref().map(|t| (s, t)))
        .collect();

    let first = match sprites.first() {
        Some(&(_, texture)) => texture.id(),
        None => return Packing::Packed(vec![]),
    };

    if sprites.iter().all(|&(_, t)| t.id() == first) {
        debug!("{} sprites already share texture {:?}", sprites.len(), first);
        return Packing::AlreadyUnified(unified_page(&sprites));
    }

    let padding = padding as i32;
    let mut pending: Worklist<'a, T> = sprites.iter()
        .map(|&(s, t)| (s, t.to_pixel(&s.texture_region).expand(padding)))
        .collect();
    pending.sort_by_key(|&(_, r)| Reverse(r.height));

    let width = max_size.x.min(i32::max_value() as u32) as i32;
    let height = max_size.y.min(i32::max_value() as u32) as i32;
    if let Some(&(sprite, rect)) = pending.iter().find(|(_, r)| r.width > width || r.height > height) {
        warn!(
            "Sprite '{}' needs {}x{} but pages are {}x{}, nothing packed",
            sprite.name, rect.width, rect.height, width, height
        );
        return Packing::Packed(vec![]);
    }

    let max_layers = max_layers.max(1);
    let bounds = Rect::new(0, 0, width, height);
    let mut packer = RectPacker::new(width, height);
    let mut pages = vec![Page::new()];
    let mut array_index = 0;

    loop {
        packer.create_root(width, height);
        let (placed, rest) = pack_layer(&mut packer, pending, padding);

        if placed.is_empty() {
            // Unreachable once every rect fits an empty page, but an empty
            // pass would never terminate.
            warn!("{} sprites could not be placed on an empty layer", rest.len());
            return Packing::Packed(vec![]);
        }

        trace!(
            "Page {} layer {}: {} sprites, {} left",
            pages.len() - 1, array_index, placed.len(), rest.len()
        );
        if let Some(page) = pages.last_mut() {
            page.layers.insert(array_index, Layer {
                array_index,
                bounds,
                regions: placed,
            });
        }

        pending = rest;
        if pending.is_empty() {
            break;
        }

        array_index += 1;
        if array_index >= max_layers {
            array_index = 0;
            pages.push(Page::new());
        }
    }

    debug!(
        "Packed {} sprites onto {} page(s) of {}x{}",
        sprites.len(), pages.len(), width, height
    );
    Packing::Packed(pages)
}

/// Packs as much of the worklist as fits into the packer's page. Returns
/// the placed regions (padding removed) and whatever is left over, both
/// in worklist order.
fn pack_layer<'a, T>(
    packer: &mut RectPacker,
    pending: Worklist<'a, T>,
    padding: i32,
) -> (Worklist<'a, T>, Worklist<'a, T>) {
    let mut placed = Vec::with_capacity(pending.len());
    let mut rest = Vec::new();

    for (sprite, rect) in pending {
        match packer.add(rect.width, rect.height) {
            Some(region) => placed.push((sprite, region.expand(-padding))),
            None => rest.push((sprite, rect)),
        }
    }

    (placed, rest)
}

fn unified_page<'a, T>(sprites: &[(&'a Sprite<T>, &T)]) -> Page<'a, T>
    where T: Texture
{
    let mut page = Page::new();
    for &(sprite, texture) in sprites {
        let array_index = sprite.texture_array_index;
        page.layers
            .entry(array_index)
            .or_insert_with(|| Layer {
                array_index,
                bounds: Rect::new(0, 0, texture.width() as i32, texture.height() as i32),
                regions: Vec::new(),
            })
            .regions
            .push((sprite, texture.to_pixel(&sprite.texture_region)));
    }
    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::soft::{SoftGraphics, SoftTexture};
    use crate::graphics::{Format, Graphics, TextureInfo};
    use cgmath::Vector2;

    fn texture(graphics: &mut SoftGraphics, w: u32, h: u32) -> SoftTexture {
        graphics
            .create_texture(&TextureInfo::new("src", w, h, Format::R8G8B8A8Unorm))
            .unwrap()
    }

    /// One sprite per texture, each covering the whole texture.
    fn sprites(graphics: &mut SoftGraphics, sizes: &[(u32, u32)]) -> Vec<Sprite<SoftTexture>> {
        sizes.iter()
            .enumerate()
            .map(|(i, &(w, h))| {
                let tex = texture(graphics, w, h);
                Sprite::from_pixels(tex, Rect::new(0, 0, w as i32, h as i32))
                    .with_name(format!("sprite{}", i))
            })
            .collect()
    }

    fn assert_valid(packing: &Packing<'_, SoftTexture>, size: Size, max_layers: u32) {
        for page in packing.pages() {
            for layer in page.layers.values() {
                assert!(layer.array_index < max_layers);
                let bounds = Rect::new(0, 0, size.x as i32, size.y as i32);
                for (i, (_, a)) in layer.regions.iter().enumerate() {
                    assert!(bounds.contains(a), "{:?} outside {:?}", a, bounds);
                    for (_, b) in &layer.regions[i + 1..] {
                        assert!(!a.intersects(b), "{:?} overlaps {:?}", a, b);
                    }
                }
            }
        }
    }

    #[test]
    fn test_empty_input() {
        let packing = calculate_regions::<SoftTexture>(&[], Vector2::new(128, 128), 1, 0);
        assert!(packing.is_empty());
        assert!(!packing.is_unchanged());
    }

    #[test]
    fn test_shelf_scenario() {
        let mut graphics = SoftGraphics::new();
        let list = sprites(&mut graphics, &[(64, 64), (32, 32), (96, 32)]);
        let refs: Vec<_> = list.iter().collect();
        let size = Vector2::new(128, 128);

        let packing = calculate_regions(&refs, size, 1, 2);
        assert!(!packing.is_unchanged());
        assert_eq!(packing.page_count(), 1);
        let page = &packing.pages()[0];
        assert_eq!(page.layers.len(), 1);
        assert_eq!(page.sprite_count(), 3);

        let layer = &page.layers[&0];
        let find = |name: &str| layer.regions.iter().find(|(s, _)| s.name == name).unwrap().1;
        // Tallest first, the wide sprite goes underneath it and the small
        // one to its right.
        assert_eq!(find("sprite0"), Rect::new(2, 2, 64, 64));
        assert_eq!(find("sprite2"), Rect::new(2, 70, 96, 32));
        assert_eq!(find("sprite1"), Rect::new(70, 2, 32, 32));
        assert_valid(&packing, size, 1);
    }

    #[test]
    fn test_one_sprite_per_page() {
        let mut graphics = SoftGraphics::new();
        let list = sprites(&mut graphics, &[(100, 100); 5]);
        let refs: Vec<_> = list.iter().collect();

        let packing = calculate_regions(&refs, Vector2::new(128, 128), 1, 0);
        assert_eq!(packing.page_count(), 5);
        for page in packing.pages() {
            assert_eq!(page.sprite_count(), 1);
            assert_eq!(page.layers[&0].regions[0].1, Rect::new(0, 0, 100, 100));
        }
    }

    #[test]
    fn test_layers_before_pages() {
        let mut graphics = SoftGraphics::new();
        let list = sprites(&mut graphics, &[(100, 100); 5]);
        let refs: Vec<_> = list.iter().collect();

        let packing = calculate_regions(&refs, Vector2::new(128, 128), 2, 0);
        assert_eq!(packing.page_count(), 3);
        let pages = packing.pages();
        assert_eq!(pages[0].layers.keys().cloned().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(pages[1].layers.keys().cloned().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(pages[2].layers.keys().cloned().collect::<Vec<_>>(), vec![0]);
        assert_valid(&packing, Vector2::new(128, 128), 2);
    }

    #[test]
    fn test_oversized_sprite_fails_whole_batch() {
        let mut graphics = SoftGraphics::new();
        let list = sprites(&mut graphics, &[(16, 16), (16, 16), (120, 10)]);
        let refs: Vec<_> = list.iter().collect();

        // Fits without padding, not with it.
        assert_eq!(calculate_regions(&refs, Vector2::new(128, 128), 1, 0).page_count(), 1);
        let packing = calculate_regions(&refs, Vector2::new(128, 128), 1, 5);
        assert!(packing.is_empty());
        assert!(!packing.is_unchanged());
    }

    #[test]
    fn test_same_texture_is_unchanged() {
        let mut graphics = SoftGraphics::new();
        let tex = graphics
            .create_texture(&TextureInfo::new("sheet", 256, 256, Format::R8G8B8A8Unorm).with_array_count(2))
            .unwrap();
        let list = vec![
            Sprite::from_pixels(tex.clone(), Rect::new(0, 0, 32, 32)),
            Sprite::from_pixels(tex.clone(), Rect::new(32, 0, 64, 16)),
            Sprite::from_pixels(tex.clone(), Rect::new(8, 8, 8, 8)).with_array_index(1),
        ];
        let refs: Vec<_> = list.iter().collect();

        let packing = calculate_regions(&refs, Vector2::new(64, 64), 1, 4);
        assert!(packing.is_unchanged());
        assert_eq!(packing.page_count(), 1);
        let page = &packing.pages()[0];
        assert_eq!(page.layers[&0].bounds, Rect::new(0, 0, 256, 256));
        assert_eq!(page.layers[&0].regions[0].1, Rect::new(0, 0, 32, 32));
        assert_eq!(page.layers[&0].regions[1].1, Rect::new(32, 0, 64, 16));
        assert_eq!(page.layers[&1].regions[0].1, Rect::new(8, 8, 8, 8));
    }

    #[test]
    fn test_empty_sprites_are_skipped() {
        let mut graphics = SoftGraphics::new();
        let mut list = sprites(&mut graphics, &[(32, 32), (16, 16)]);
        let blank = Sprite::from_pixels(texture(&mut graphics, 8, 8), Rect::new(0, 0, 0, 8));
        let mut untextured = list[0].clone();
        untextured.texture = None;
        list.push(blank);
        list.push(untextured);
        let refs: Vec<_> = list.iter().collect();

        let packing = calculate_regions(&refs, Vector2::new(64, 64), 1, 0);
        assert_eq!(packing.page_count(), 1);
        assert_eq!(packing.pages()[0].sprite_count(), 2);
    }

    #[test]
    fn test_sub_pixel_sprite_is_skipped() {
        let mut graphics = SoftGraphics::new();
        let list = vec![
            sprites(&mut graphics, &[(32, 32)]).remove(0),
            Sprite::new(texture(&mut graphics, 256, 256), crate::sprite::TexelRect::new(0.0, 0.0, 0.001, 0.5)),
        ];
        let refs: Vec<_> = list.iter().collect();

        for &padding in &[0, 2] {
            let packing = calculate_regions(&refs, Vector2::new(128, 128), 1, padding);
            assert_eq!(packing.page_count(), 1, "padding {}", padding);
            let layer = &packing.pages()[0].layers[&0];
            assert_eq!(layer.regions.len(), 1);
            assert!(std::ptr::eq(layer.regions[0].0, &list[0]));
            assert!(!layer.regions[0].1.is_empty());
        }
    }

    #[test]
    fn test_many_mixed_sizes_do_not_overlap() {
        let mut graphics = SoftGraphics::new();
        let sizes: Vec<_> = (0..60u32)
            .map(|i| (8 + (i * 37) % 90, 8 + (i * 53) % 70))
            .collect();
        let list = sprites(&mut graphics, &sizes);
        let refs: Vec<_> = list.iter().collect();
        let size = Vector2::new(256, 256);

        let packing = calculate_regions(&refs, size, 3, 1);
        let placed: usize = packing.pages().iter().map(|p| p.sprite_count()).sum();
        assert_eq!(placed, list.len());
        assert_valid(&packing, size, 3);
    }
}
