use std::process;
use std::str::FromStr;

use cgmath::Vector2;
use clap::Parser;
use error_chain::bail;
use log::*;

use texatlas::graphics::soft::{SoftGraphics, SoftTexture};
use texatlas::graphics::TextureInfo;
use texatlas::{error, Format, Graphics, Rect, Sprite, Texture, TextureAtlasService};

/// Packs a set of solid coloured test sprites into an atlas and prints
/// where each one ended up.
#[derive(Parser)]
#[command(name = "texatlas")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pixels of padding around each sprite
    #[arg(short, long, default_value = "0")]
    padding: u32,

    /// Smallest texture size to consider
    #[arg(long, default_value = "16")]
    min_size: u32,

    /// Smallest array count to consider
    #[arg(short, long, default_value = "1")]
    layers: u32,

    /// Atlas texture format
    #[arg(short, long, default_value = "rgba8")]
    format: FormatArg,

    /// Sprite sizes as WIDTHxHEIGHT
    #[arg(required = true)]
    sprites: Vec<SpriteSize>,
}

#[derive(Clone, Copy)]
struct SpriteSize(u32, u32);

impl FromStr for SpriteSize {
    type Err = String;

    fn from_str(s: &str) -> Result<SpriteSize, String> {
        let mut parts = s.splitn(2, |c| c == 'x' || c == 'X');
        let mut next = || {
            parts.next()
                .and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|&v| v > 0)
                .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))
        };
        Ok(SpriteSize(next()?, next()?))
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum FormatArg {
    Rgba8,
    Rgba8Srgb,
    Bgra8,
    Bgra8Srgb,
    Rgba16f,
}

impl From<FormatArg> for Format {
    fn from(v: FormatArg) -> Format {
        match v {
            FormatArg::Rgba8 => Format::R8G8B8A8Unorm,
            FormatArg::Rgba8Srgb => Format::R8G8B8A8UnormSrgb,
            FormatArg::Bgra8 => Format::B8G8R8A8Unorm,
            FormatArg::Bgra8Srgb => Format::B8G8R8A8UnormSrgb,
            FormatArg::Rgba16f => Format::R16G16B16A16Float,
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        error!("{}", e);
        for cause in e.iter().skip(1) {
            error!("caused by: {}", cause);
        }
        process::exit(1);
    }
}

fn run(cli: &Cli) -> error::Result<()> {
    let mut graphics = SoftGraphics::new();

    let mut sprites = Vec::with_capacity(cli.sprites.len());
    for (i, &SpriteSize(w, h)) in cli.sprites.iter().enumerate() {
        let name = format!("sprite_{}", i);
        let texture = graphics.create_texture(&TextureInfo::new(name.clone(), w, h, Format::R8G8B8A8Unorm))?;
        let shade = (i * 47 % 200 + 55) as u8;
        texture.fill(0, Rect::new(0, 0, w as i32, h as i32), [shade, 255 - shade, 128, 255])?;
        sprites.push(Sprite::<SoftTexture>::from_pixels(texture, Rect::new(0, 0, w as i32, h as i32)).with_name(name));
    }

    let mut service = TextureAtlasService::new(*graphics.limits()).with_padding(cli.padding);
    let fit = service.get_best_fit(&sprites, Vector2::new(cli.min_size, cli.min_size), cli.layers);
    if !fit.fits() {
        bail!("sprites do not fit the device limits (best fit {}x{}x{})", fit.size.x, fit.size.y, fit.layers);
    }
    info!("Best fit: {}x{} with {} array indices", fit.size.x, fit.size.y, fit.layers);

    service.set_texture_size(fit.size);
    service.set_array_count(fit.layers);
    let regions = service.get_sprite_regions(&sprites);
    if regions.is_empty() {
        bail!("no sprite regions could be calculated");
    }

    let atlas = service.generate_atlas(&mut graphics, &regions, cli.format.into())?;
    for texture in atlas.textures() {
        println!(
            "{}: {}x{}x{} {:?}",
            texture.name(), texture.width(), texture.height(), texture.array_count(), texture.format()
        );
    }
    for (original, moved) in atlas.sprites() {
        let region = moved.pixel_region().unwrap_or_default();
        let uv = moved.texture_region;
        println!(
            "{:>12} -> index {} at {},{} {}x{}  uv {:.4},{:.4} {:.4}x{:.4}",
            original.name, moved.texture_array_index,
            region.x, region.y, region.width, region.height,
            uv.position.x, uv.position.y, uv.size.x, uv.size.y
        );
    }
    Ok(())
}
