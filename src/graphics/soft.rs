//! CPU implementation of [`Graphics`](super::Graphics).
//!
//! Textures live in plain byte buffers, one tightly sized block per array
//! layer with rows padded out to `ROW_PITCH_ALIGNMENT`. Only 32-bit colour
//! formats are supported. Blits are point sampled, so copying a region at
//! its own size is byte exact.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use byteorder::{ByteOrder, LittleEndian};
use log::*;

use super::{Blit, Format, Graphics, Limits, Texture, TextureId, TextureInfo};
use crate::atlas::Rect;
use crate::error::{self, ErrorKind};

const ROW_PITCH_ALIGNMENT: u32 = 256;

struct Memory {
    used: Cell<usize>,
    budget: Option<usize>,
}

struct SoftImage {
    id: TextureId,
    name: String,
    width: u32,
    height: u32,
    array_count: u32,
    format: Format,
    render_target: bool,
    row_pitch: u32,
    data: RefCell<Vec<u8>>,
    memory: Rc<Memory>,
}

impl Drop for SoftImage {
    fn drop(&mut self) {
        let size = self.data.borrow().len();
        self.memory.used.set(self.memory.used.get() - size);
        trace!("Released texture '{}' ({} bytes)", self.name, size);
    }
}

/// Reference counted handle to a CPU texture.
#[derive(Clone)]
pub struct SoftTexture(Rc<SoftImage>);

impl fmt::Debug for SoftTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftTexture")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("width", &self.0.width)
            .field("height", &self.0.height)
            .field("array_count", &self.0.array_count)
            .field("format", &self.0.format)
            .finish()
    }
}

impl PartialEq for SoftTexture {
    fn eq(&self, other: &SoftTexture) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Texture for SoftTexture {
    fn id(&self) -> TextureId {
        self.0.id
    }
    fn name(&self) -> &str {
        &self.0.name
    }
    fn width(&self) -> u32 {
        self.0.width
    }
    fn height(&self) -> u32 {
        self.0.height
    }
    fn array_count(&self) -> u32 {
        self.0.array_count
    }
    fn format(&self) -> Format {
        self.0.format
    }
}

impl SoftTexture {
    pub fn row_pitch(&self) -> u32 {
        self.0.row_pitch
    }

    fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.0.width as i32, self.0.height as i32)
    }

    fn offset(&self, array_index: u32, x: i32, y: i32) -> usize {
        let layer = self.0.row_pitch as usize * self.0.height as usize;
        array_index as usize * layer
            + y as usize * self.0.row_pitch as usize
            + x as usize * 4
    }

    fn check(&self, array_index: u32, rect: Rect) -> error::Result<()> {
        if array_index >= self.0.array_count {
            bail!(ErrorKind::InvalidArrayIndex(array_index, self.0.array_count));
        }
        if rect.is_empty() || !self.bounds().contains(&rect) {
            bail!(ErrorKind::InvalidRegion(rect, self.0.width, self.0.height));
        }
        Ok(())
    }

    pub fn read_pixel(&self, array_index: u32, x: i32, y: i32) -> Option<[u8; 4]> {
        if array_index >= self.0.array_count
            || x < 0 || y < 0
            || x >= self.0.width as i32 || y >= self.0.height as i32
        {
            return None;
        }
        let data = self.0.data.borrow();
        let idx = self.offset(array_index, x, y);
        Some(decode(self.0.format, LittleEndian::read_u32(&data[idx..idx + 4])))
    }

    /// Reads a region as tightly packed RGBA rows.
    pub fn read_rect(&self, array_index: u32, rect: Rect) -> error::Result<Vec<u8>> {
        self.check(array_index, rect)?;
        let data = self.0.data.borrow();
        let mut out = vec![0u8; rect.width as usize * rect.height as usize * 4];
        for y in 0 .. rect.height {
            for x in 0 .. rect.width {
                let idx = self.offset(array_index, rect.x + x, rect.y + y);
                let px = decode(self.0.format, LittleEndian::read_u32(&data[idx..idx + 4]));
                let didx = (x as usize + y as usize * rect.width as usize) * 4;
                out[didx..didx + 4].copy_from_slice(&px);
            }
        }
        Ok(out)
    }

    /// Writes tightly packed RGBA rows into a region.
    pub fn write_rect(&self, array_index: u32, rect: Rect, pixels: &[u8]) -> error::Result<()> {
        self.check(array_index, rect)?;
        let expected = rect.width as usize * rect.height as usize * 4;
        if pixels.len() != expected {
            bail!("expected {} bytes of pixel data, got {}", expected, pixels.len());
        }
        let mut data = self.0.data.borrow_mut();
        for y in 0 .. rect.height {
            for x in 0 .. rect.width {
                let sidx = (x as usize + y as usize * rect.width as usize) * 4;
                let px = [pixels[sidx], pixels[sidx + 1], pixels[sidx + 2], pixels[sidx + 3]];
                let idx = self.offset(array_index, rect.x + x, rect.y + y);
                LittleEndian::write_u32(&mut data[idx..idx + 4], encode(self.0.format, px));
            }
        }
        Ok(())
    }

    /// Fills a region with a single RGBA colour.
    pub fn fill(&self, array_index: u32, rect: Rect, rgba: [u8; 4]) -> error::Result<()> {
        self.check(array_index, rect)?;
        let value = encode(self.0.format, rgba);
        let mut data = self.0.data.borrow_mut();
        for y in rect.y .. rect.bottom() {
            for x in rect.x .. rect.right() {
                let idx = self.offset(array_index, x, y);
                LittleEndian::write_u32(&mut data[idx..idx + 4], value);
            }
        }
        Ok(())
    }
}

fn encode(format: Format, rgba: [u8; 4]) -> u32 {
    let [r, g, b, a] = rgba;
    match format {
        Format::B8G8R8A8Unorm | Format::B8G8R8A8UnormSrgb => {
            LittleEndian::read_u32(&[b, g, r, a])
        }
        _ => LittleEndian::read_u32(&[r, g, b, a]),
    }
}

fn decode(format: Format, value: u32) -> [u8; 4] {
    let mut px = [0u8; 4];
    LittleEndian::write_u32(&mut px, value);
    match format {
        Format::B8G8R8A8Unorm | Format::B8G8R8A8UnormSrgb => [px[2], px[1], px[0], px[3]],
        _ => px,
    }
}

fn to_unorm(color: [f32; 4]) -> [u8; 4] {
    let c = |v: f32| (v.max(0.0).min(1.0) * 255.0).round() as u8;
    [c(color[0]), c(color[1]), c(color[2]), c(color[3])]
}

/// One array layer of a [`SoftTexture`] bound for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftTarget {
    texture: SoftTexture,
    array_index: u32,
}

impl SoftTarget {
    pub fn texture(&self) -> &SoftTexture {
        &self.texture
    }

    pub fn array_index(&self) -> u32 {
        self.array_index
    }
}

/// A single threaded software device.
pub struct SoftGraphics {
    limits: Limits,
    memory: Rc<Memory>,
    next_id: u64,
    target: Option<SoftTarget>,
    live_targets: usize,
}

impl SoftGraphics {
    pub fn new() -> SoftGraphics {
        SoftGraphics {
            limits: Limits::default(),
            memory: Rc::new(Memory {
                used: Cell::new(0),
                budget: None,
            }),
            next_id: 1,
            target: None,
            live_targets: 0,
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Caps the total bytes of live textures. Creating a texture past the
    /// budget fails.
    pub fn with_memory_budget(mut self, bytes: usize) -> Self {
        self.memory = Rc::new(Memory {
            used: Cell::new(self.memory.used.get()),
            budget: Some(bytes),
        });
        self
    }

    pub fn allocated_bytes(&self) -> usize {
        self.memory.used.get()
    }

    /// Target views handed out and not yet released.
    pub fn live_targets(&self) -> usize {
        self.live_targets
    }
}

impl Default for SoftGraphics {
    fn default() -> SoftGraphics {
        SoftGraphics::new()
    }
}

impl fmt::Debug for SoftGraphics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftGraphics")
            .field("limits", &self.limits)
            .field("allocated_bytes", &self.memory.used.get())
            .field("live_targets", &self.live_targets)
            .finish()
    }
}

impl Graphics for SoftGraphics {
    type Texture = SoftTexture;
    type Target = SoftTarget;

    fn limits(&self) -> &Limits {
        &self.limits
    }

    fn supports_render_target(&self, format: Format) -> bool {
        match format {
            Format::R8G8B8A8Unorm
            | Format::R8G8B8A8UnormSrgb
            | Format::B8G8R8A8Unorm
            | Format::B8G8R8A8UnormSrgb => true,
            _ => false,
        }
    }

    fn create_texture(&mut self, info: &TextureInfo) -> error::Result<SoftTexture> {
        if !self.supports_render_target(info.format) {
            bail!(ErrorKind::UnsupportedFormat(info.format));
        }
        if info.width == 0 || info.height == 0
            || info.width > self.limits.max_texture_width
            || info.height > self.limits.max_texture_height
        {
            bail!("texture '{}' has invalid size {}x{}", info.name, info.width, info.height);
        }
        if info.array_count == 0 || info.array_count > self.limits.max_array_count {
            bail!(ErrorKind::InvalidArrayIndex(info.array_count, self.limits.max_array_count));
        }

        let row_size = info.width * info.format.bytes_per_pixel();
        let row_alignment_mask = ROW_PITCH_ALIGNMENT - 1;
        let row_pitch = (row_size + row_alignment_mask) & !row_alignment_mask;
        let size = row_pitch as usize * info.height as usize * info.array_count as usize;

        let used = self.memory.used.get();
        if let Some(budget) = self.memory.budget {
            if used + size > budget {
                bail!(ErrorKind::OutOfMemory(size, budget.saturating_sub(used)));
            }
        }
        self.memory.used.set(used + size);

        let id = TextureId(self.next_id);
        self.next_id += 1;
        debug!(
            "Created texture '{}' {}x{}x{} {:?} ({} bytes)",
            info.name, info.width, info.height, info.array_count, info.format, size
        );

        Ok(SoftTexture(Rc::new(SoftImage {
            id,
            name: info.name.clone(),
            width: info.width,
            height: info.height,
            array_count: info.array_count,
            format: info.format,
            render_target: info.render_target,
            row_pitch,
            data: RefCell::new(vec![0; size]),
            memory: self.memory.clone(),
        })))
    }

    fn render_target_view(&mut self, texture: &SoftTexture, array_index: u32) -> error::Result<SoftTarget> {
        if !texture.0.render_target {
            bail!("texture '{}' was not created as a render target", texture.name());
        }
        if array_index >= texture.array_count() {
            bail!(ErrorKind::InvalidArrayIndex(array_index, texture.array_count()));
        }
        self.live_targets += 1;
        Ok(SoftTarget {
            texture: texture.clone(),
            array_index,
        })
    }

    fn render_target(&self) -> Option<SoftTarget> {
        self.target.clone()
    }

    fn set_render_target(&mut self, target: Option<&SoftTarget>) {
        self.target = target.cloned();
    }

    fn clear(&mut self, target: &SoftTarget, color: [f32; 4]) -> error::Result<()> {
        let bounds = target.texture.bounds();
        target.texture.fill(target.array_index, bounds, to_unorm(color))
    }

    fn blit(&mut self, blit: &Blit<'_, SoftTexture>) -> error::Result<()> {
        let target = match self.target {
            Some(ref target) => target,
            None => bail!(ErrorKind::NoRenderTarget),
        };
        if blit.destination.is_empty() {
            return Ok(());
        }

        // Read first, the source may be the target itself.
        let source = blit.texture.read_rect(blit.array_index, blit.source)?;
        let src = blit.source;
        let dst = blit.destination;
        let bounds = target.texture.bounds();
        let format = target.texture.format();
        let mut data = target.texture.0.data.borrow_mut();

        for y in dst.y.max(0) .. dst.bottom().min(bounds.height) {
            let sy = ((y - dst.y) as i64 * src.height as i64 / dst.height as i64) as usize;
            for x in dst.x.max(0) .. dst.right().min(bounds.width) {
                let sx = ((x - dst.x) as i64 * src.width as i64 / dst.width as i64) as usize;
                let sidx = (sx + sy * src.width as usize) * 4;
                let px = [source[sidx], source[sidx + 1], source[sidx + 2], source[sidx + 3]];
                let idx = target.texture.offset(target.array_index, x, y);
                LittleEndian::write_u32(&mut data[idx..idx + 4], encode(format, px));
            }
        }
        Ok(())
    }

    fn release_target(&mut self, target: SoftTarget) {
        if self.target.as_ref() == Some(&target) {
            self.target = None;
        }
        self.live_targets = self.live_targets.saturating_sub(1);
    }
}
