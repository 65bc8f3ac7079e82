use std::cmp::Reverse;

use cgmath::Vector2;
use log::*;

use super::packer::Rect;
use super::regions::calculate_regions;
use crate::graphics::{Limits, Texture};
use crate::sprite::{Size, Sprite};

/// Smallest size a best fit page may have on either axis.
pub const MIN_FIT_SIZE: u32 = 16;

/// Page size and array count able to hold a set of sprites.
///
/// A zero size means the sprites cannot fit within the device limits. A
/// non-zero size with zero layers means the size works but more array
/// indices would be needed than the device has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestFit {
    pub size: Size,
    pub layers: u32,
}

impl BestFit {
    pub const NONE: BestFit = BestFit {
        size: Vector2 { x: 0, y: 0 },
        layers: 0,
    };

    pub fn fits(&self) -> bool {
        self.size.x != 0 && self.size.y != 0 && self.layers != 0
    }
}

fn power_of_two(size: Size) -> Size {
    Vector2::new(size.x.max(1).next_power_of_two(), size.y.max(1).next_power_of_two())
}

/// Grows `current` until every region fits inside it.
///
/// A region that does not fit is rounded up to a power of two per axis, and
/// an axis is doubled once more if that leaves less than a quarter of the
/// region spare. `current` never shrinks.
pub(crate) fn max_texture_size(regions: &[Rect], mut current: Size) -> Size {
    for rect in regions {
        let width = rect.width.max(0) as u32;
        let height = rect.height.max(0) as u32;
        if width <= current.x && height <= current.y {
            continue;
        }

        let mut size = power_of_two(Vector2::new(width, height));
        if size.x - width < width / 4 {
            size.x *= 2;
        }
        if size.y - height < height / 4 {
            size.y *= 2;
        }

        current = Vector2::new(current.x.max(size.x), current.y.max(size.y));
    }
    current
}

/// See [`TextureAtlasService::get_best_fit`](super::TextureAtlasService::get_best_fit).
pub(crate) fn best_fit<T>(
    sprites: &[&Sprite<T>],
    min_size: Size,
    min_layers: u32,
    padding: u32,
    limits: &Limits,
) -> BestFit
    where T: Texture
{
    let sprites: Vec<&Sprite<T>> = sprites.iter().cloned().filter(|s| s.is_valid()).collect();
    if sprites.is_empty() {
        return BestFit::NONE;
    }

    let min_layers = min_layers.max(1).min(limits.max_array_count);
    let min_size = Vector2::new(
        min_size.x.max(MIN_FIT_SIZE).min(limits.max_texture_width),
        min_size.y.max(MIN_FIT_SIZE).min(limits.max_texture_height),
    );

    let mut regions: Vec<Rect> = sprites.iter()
        .filter_map(|s| s.pixel_region())
        .map(|r| r.expand(padding as i32))
        .collect();
    regions.sort_by_key(|r| Reverse(r.height));

    let size = max_texture_size(&regions, min_size);
    if size.x > limits.max_texture_width || size.y > limits.max_texture_height {
        warn!(
            "Sprites need a {}x{} texture, the device allows {}x{}",
            size.x, size.y, limits.max_texture_width, limits.max_texture_height
        );
        return BestFit::NONE;
    }

    let pages = calculate_regions(&sprites, size, 1, padding).page_count() as u32;
    if pages == 0 {
        return BestFit::NONE;
    }
    if pages > limits.max_array_count {
        warn!(
            "Sprites need {} array indices, the device allows {}",
            pages, limits.max_array_count
        );
        return BestFit { size, layers: 0 };
    }

    let fit = BestFit {
        size,
        layers: pages.max(min_layers),
    };
    debug!("Best fit for {} sprites: {}x{}x{}", sprites.len(), fit.size.x, fit.size.y, fit.layers);
    fit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_of_two() {
        assert_eq!(power_of_two(Vector2::new(1, 0)), Vector2::new(1, 1));
        assert_eq!(power_of_two(Vector2::new(100, 64)), Vector2::new(128, 64));
        assert_eq!(power_of_two(Vector2::new(257, 513)), Vector2::new(512, 1024));
    }

    #[test]
    fn test_fitting_regions_keep_minimum() {
        let regions = [Rect::new(0, 0, 100, 100), Rect::new(0, 0, 10, 10)];
        assert_eq!(max_texture_size(&regions, Vector2::new(128, 128)), Vector2::new(128, 128));
    }

    #[test]
    fn test_slack_doubling() {
        // 120 -> 128 leaves 8 spare, less than 30, so it doubles.
        // 70 -> 128 leaves 58 spare, more than 17, so it stays.
        let regions = [Rect::new(0, 0, 120, 70)];
        assert_eq!(max_texture_size(&regions, Vector2::new(16, 16)), Vector2::new(256, 128));

        // Exact powers of two always double.
        let regions = [Rect::new(0, 0, 64, 32)];
        assert_eq!(max_texture_size(&regions, Vector2::new(16, 16)), Vector2::new(128, 64));
    }

    #[test]
    fn test_never_shrinks_an_axis() {
        let regions = [Rect::new(0, 0, 300, 10)];
        assert_eq!(max_texture_size(&regions, Vector2::new(256, 256)), Vector2::new(512, 256));
    }

    #[test]
    fn test_fits() {
        assert!(!BestFit::NONE.fits());
        assert!(!BestFit { size: Vector2::new(64, 64), layers: 0 }.fits());
        assert!(BestFit { size: Vector2::new(64, 64), layers: 1 }.fits());
    }
}
