use crate::atlas::Rect;
use crate::graphics::Format;

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }

    links {
    }

    foreign_links {
    }

    errors {
        UnsupportedFormat(format: Format) {
            description("format cannot be used as a render target")
            display("format {:?} cannot be used as a render target", format)
        }
        InvalidArrayIndex(index: u32, count: u32) {
            description("array index out of range")
            display("array index {} is out of range for {} array indices", index, count)
        }
        MissingTexture(sprite: String) {
            description("sprite has no texture")
            display("sprite '{}' has no texture to copy from", sprite)
        }
        TextureCreation(name: String) {
            description("could not create texture")
            display("could not create texture '{}'", name)
        }
        OutOfMemory(requested: usize, available: usize) {
            description("out of texture memory")
            display("out of texture memory, {} bytes requested but only {} available", requested, available)
        }
        NoRenderTarget {
            description("no render target bound")
            display("no render target bound")
        }
        InvalidRegion(region: Rect, width: u32, height: u32) {
            description("region lies outside the texture")
            display("region {:?} lies outside the {}x{} texture", region, width, height)
        }
    }
}
