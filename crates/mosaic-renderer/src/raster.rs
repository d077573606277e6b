//! Decoded tile buffers.
//!
//! Tiles of one pyramid do not have to share an encoding: a level can mix
//! paletted PNGs, grey or RGB JPEGs and RGBA PNGs. [`TileImage`] keeps a
//! decoded tile in its own colour model; [`TileImage::to_rgba8`] is the single
//! normalisation step the compositor relies on.

use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

use crate::{RenderError, RenderResult};

/// Colour model of a decoded tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorModel {
    Paletted,
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
    /// 16-bit or floating point direct colour
    Other,
}

impl ColorModel {
    pub fn has_alpha(&self) -> bool {
        matches!(self, ColorModel::GrayAlpha | ColorModel::Rgba)
    }
}

/// An 8-bit indexed image with an RGBA palette.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PalettedImage {
    width: u32,
    height: u32,
    palette: Vec<[u8; 4]>,
    indices: Vec<u8>,
}

impl PalettedImage {
    pub fn new(
        width: u32,
        height: u32,
        palette: Vec<[u8; 4]>,
        indices: Vec<u8>,
    ) -> RenderResult<Self> {
        let expected = width as usize * height as usize;
        if indices.len() != expected {
            return Err(RenderError::InvalidRaster(format!(
                "{}x{} paletted image needs {} indices, got {}",
                width,
                height,
                expected,
                indices.len()
            )));
        }
        if palette.is_empty() || palette.len() > 256 {
            return Err(RenderError::InvalidRaster(format!(
                "palette must hold 1-256 entries, got {}",
                palette.len()
            )));
        }
        Ok(Self {
            width,
            height,
            palette,
            indices,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn palette(&self) -> &[[u8; 4]] {
        &self.palette
    }

    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    /// Palette lookup. Indices past the palette end become transparent black.
    pub fn color_at(&self, x: u32, y: u32) -> [u8; 4] {
        let index = self.indices[y as usize * self.width as usize + x as usize] as usize;
        self.palette.get(index).copied().unwrap_or([0, 0, 0, 0])
    }

    pub fn to_rgba8(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| Rgba(self.color_at(x, y)))
    }
}

/// A decoded tile in its native colour model.
#[derive(Debug, Clone)]
pub enum TileImage {
    Paletted(PalettedImage),
    Direct(DynamicImage),
}

impl TileImage {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            TileImage::Paletted(img) => (img.width(), img.height()),
            TileImage::Direct(img) => img.dimensions(),
        }
    }

    pub fn width(&self) -> u32 {
        self.dimensions().0
    }

    pub fn height(&self) -> u32 {
        self.dimensions().1
    }

    pub fn color_model(&self) -> ColorModel {
        match self {
            TileImage::Paletted(_) => ColorModel::Paletted,
            TileImage::Direct(DynamicImage::ImageLuma8(_)) => ColorModel::Gray,
            TileImage::Direct(DynamicImage::ImageLumaA8(_)) => ColorModel::GrayAlpha,
            TileImage::Direct(DynamicImage::ImageRgb8(_)) => ColorModel::Rgb,
            TileImage::Direct(DynamicImage::ImageRgba8(_)) => ColorModel::Rgba,
            TileImage::Direct(_) => ColorModel::Other,
        }
    }

    /// Normalise to 8-bit RGBA. Colour models without alpha come out opaque.
    pub fn to_rgba8(&self) -> RgbaImage {
        match self {
            TileImage::Paletted(img) => img.to_rgba8(),
            TileImage::Direct(img) => img.to_rgba8(),
        }
    }

    /// Encode as PNG, indexed when the colours allow it.
    pub fn encode_png(&self) -> RenderResult<Vec<u8>> {
        match self {
            TileImage::Paletted(img) => crate::png::create_png_indexed(
                img.width() as usize,
                img.height() as usize,
                img.palette(),
                img.indices(),
            ),
            TileImage::Direct(img) => {
                let rgba = img.to_rgba8();
                let (width, height) = rgba.dimensions();
                crate::png::create_png_auto(rgba.as_raw(), width as usize, height as usize)
            }
        }
    }
}

impl From<PalettedImage> for TileImage {
    fn from(img: PalettedImage) -> Self {
        TileImage::Paletted(img)
    }
}

impl From<DynamicImage> for TileImage {
    fn from(img: DynamicImage) -> Self {
        TileImage::Direct(img)
    }
}
