
/// Guillotine packer over a list of free rectangles.
///
/// Every `add` picks the free rectangle that leaves the smallest area over,
/// places the request in its top-left corner and splits what remains into
/// at most two new free rectangles. Nothing is ever rotated and the result
/// only depends on the page size and the order of the requests.
#[derive(Debug, Clone)]
pub struct RectPacker {
    free_rects: Vec<Rect>,
}

impl RectPacker {
    pub fn new(width: i32, height: i32) -> RectPacker {
        let mut packer = RectPacker {
            free_rects: Vec::with_capacity(16),
        };
        packer.create_root(width, height);
        packer
    }

    /// Forgets every placement and starts over with one empty page.
    pub fn create_root(&mut self, width: i32, height: i32) {
        self.free_rects.clear();
        if width > 0 && height > 0 {
            self.free_rects.push(Rect { x: 0, y: 0, width, height });
        }
    }

    pub fn free_rects(&self) -> &[Rect] {
        &self.free_rects
    }

    pub fn add(&mut self, width: i32, height: i32) -> Option<Rect> {
        if width <= 0 || height <= 0 {
            return None;
        }

        let mut best: Option<(i64, usize)> = None;
        for (idx, free) in self.free_rects.iter().enumerate() {
            if free.width < width || free.height < height {
                continue;
            }
            let score = i64::from(free.width - width) * i64::from(free.height - height);
            // Strictly tighter only, so the earliest free rect wins ties.
            if best.map_or(true, |v| v.0 > score) {
                best = Some((score, idx));
                if score == 0 {
                    // Perfect match
                    break;
                }
            }
        }

        let (_, idx) = best?;
        let rect = self.free_rects.remove(idx);
        let ret = Rect {
            x: rect.x,
            y: rect.y,
            width,
            height,
        };

        let left_w = rect.width - width;
        let left_h = rect.height - height;

        // Split along the shorter leftover axis. The bigger remainder keeps
        // the full extent of the free rect on that side.
        if left_w <= left_h {
            if left_w > 0 {
                self.free_rects.push(Rect {
                    x: rect.x + width,
                    y: rect.y,
                    width: left_w,
                    height,
                });
            }
            if left_h > 0 {
                self.free_rects.push(Rect {
                    x: rect.x,
                    y: rect.y + height,
                    width: rect.width,
                    height: left_h,
                });
            }
        } else {
            if left_w > 0 {
                self.free_rects.push(Rect {
                    x: rect.x + width,
                    y: rect.y,
                    width: left_w,
                    height: rect.height,
                });
            }
            if left_h > 0 {
                self.free_rects.push(Rect {
                    x: rect.x,
                    y: rect.y + height,
                    width,
                    height: left_h,
                });
            }
        }

        Some(ret)
    }
}

/// Integer pixel rectangle, top-left origin.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Rect {
        Rect { x, y, width, height }
    }

    #[inline]
    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    #[inline]
    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Grows the rectangle by `amount` on every side. A negative amount
    /// shrinks it.
    pub const fn expand(self, amount: i32) -> Rect {
        Rect {
            x: self.x - amount,
            y: self.y - amount,
            width: self.width + amount * 2,
            height: self.height + amount * 2,
        }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty() && !other.is_empty()
            && self.x < other.right() && other.x < self.right()
            && self.y < other.bottom() && other.y < self.bottom()
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x && other.y >= self.y
            && other.right() <= self.right() && other.bottom() <= self.bottom()
    }
}
