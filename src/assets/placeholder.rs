//! Built-in default product image, substituted when a source fails to load.

use image::{DynamicImage, Rgba, RgbaImage};
use std::sync::OnceLock;

/// Source string that always resolves to the default product image.
pub const PLACEHOLDER_SRC: &str = "kvgen:placeholder";

const SIZE: u32 = 512;
const BORDER: u32 = 12;

static PLACEHOLDER: OnceLock<DynamicImage> = OnceLock::new();

/// Light grey tile with a darker frame and diagonal cross.
pub fn placeholder_image() -> &'static DynamicImage {
    PLACEHOLDER.get_or_init(|| {
        let fill = Rgba([228, 228, 228, 255]);
        let ink = Rgba([160, 160, 160, 255]);
        let img = RgbaImage::from_fn(SIZE, SIZE, |x, y| {
            let on_frame = x < BORDER || y < BORDER || x >= SIZE - BORDER || y >= SIZE - BORDER;
            let on_cross = x.abs_diff(y) < BORDER / 2 || (x + y).abs_diff(SIZE - 1) < BORDER / 2;
            if on_frame || on_cross { ink } else { fill }
        });
        DynamicImage::ImageRgba8(img)
    })
}
