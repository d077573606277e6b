//! Encoded tile generators.
//!
//! Every generator returns the bytes a tile store would hold. Colour models
//! are chosen explicitly so tests can mix paletted, grey, RGB and RGBA tiles
//! in one pyramid.

use std::io::Cursor;

use image::{
    DynamicImage, GrayImage, ImageOutputFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage,
};
use mosaic_renderer::png;

fn encode(image: DynamicImage, format: ImageOutputFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), format)
        .expect("in-memory encoding succeeds");
    buf
}

/// Indexed PNG (colour type 3) with an explicit palette.
pub fn indexed_png(width: u32, height: u32, palette: &[[u8; 4]], indices: &[u8]) -> Vec<u8> {
    png::create_png_indexed(width as usize, height as usize, palette, indices)
        .expect("indexed PNG encoding succeeds")
}

/// Indexed PNG of a single palette entry.
pub fn solid_indexed_png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    indexed_png(width, height, &[color], &vec![0; (width * height) as usize])
}

/// Indexed PNG with a vertical stripe of `stripe` on `background`, one
/// column wide at `x`.
pub fn striped_indexed_png(
    width: u32,
    height: u32,
    background: [u8; 4],
    stripe: [u8; 4],
    x: u32,
) -> Vec<u8> {
    let indices: Vec<u8> = (0..height)
        .flat_map(|_| (0..width).map(move |col| u8::from(col == x)))
        .collect();
    indexed_png(width, height, &[background, stripe], &indices)
}

/// RGBA PNG (colour type 6).
pub fn solid_rgba_png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba(color));
    png::create_png(image.as_raw(), width as usize, height as usize)
        .expect("RGBA PNG encoding succeeds")
}

/// RGB PNG (colour type 2).
pub fn solid_rgb_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    encode(
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color))),
        ImageOutputFormat::Png,
    )
}

/// Greyscale PNG (colour type 0).
pub fn solid_gray_png(width: u32, height: u32, value: u8) -> Vec<u8> {
    encode(
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([value]))),
        ImageOutputFormat::Png,
    )
}

/// Baseline JPEG. Lossy, so compare decoded pixels with a tolerance.
pub fn solid_jpeg(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    encode(
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color))),
        ImageOutputFormat::Jpeg(95),
    )
}

/// RGBA PNG whose pixels encode their own position:
/// `[x, y, seed, 255]`.
pub fn coordinate_rgba_png(width: u32, height: u32, seed: u8) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, seed, 255]));
    png::create_png(image.as_raw(), width as usize, height as usize)
        .expect("RGBA PNG encoding succeeds")
}

/// Bytes that no decoder accepts.
pub fn corrupt_tile() -> Vec<u8> {
    b"\x89PNG\r\n\x1a\nthis is not a tile".to_vec()
}
