//! PNG encoding of composites and palette-preserving PNG decoding.
//!
//! Encoding supports two modes:
//! - **Indexed PNG (color type 3)**: used when the image has ≤256 unique colors.
//! - **RGBA PNG (color type 6)**: fallback for images with >256 colors.
//!
//! Decoding is only done here for indexed, non-interlaced PNGs so that the
//! palette survives into [`PalettedImage`]; every other PNG flavour goes
//! through the `image` crate.

use rayon::prelude::*;
use std::collections::HashMap;
use std::io::{Read, Write};

use crate::raster::PalettedImage;
use crate::{RenderError, RenderResult};

/// Maximum colors for indexed PNG (PNG8)
const MAX_PALETTE_SIZE: usize = 256;

/// Minimum pixels to benefit from parallel palette extraction
const PARALLEL_THRESHOLD: usize = 4096; // 64x64 or larger

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Create a PNG image with automatic format selection.
///
/// - If ≤256 unique colors: uses indexed PNG
/// - Otherwise: uses RGBA PNG
///
/// # Arguments
/// - `pixels`: RGBA pixel data (4 bytes per pixel)
/// - `width`: Image width in pixels
/// - `height`: Image height in pixels
pub fn create_png_auto(pixels: &[u8], width: usize, height: usize) -> RenderResult<Vec<u8>> {
    let num_pixels = pixels.len() / 4;

    let palette_result = if num_pixels >= PARALLEL_THRESHOLD {
        extract_palette_parallel(pixels)
    } else {
        extract_palette_sequential(pixels)
    };

    match palette_result {
        Some((palette, indices)) => create_png_indexed(width, height, &palette, &indices),
        None => create_png(pixels, width, height),
    }
}

/// Pack RGBA bytes into a u32 for faster hashing and comparison
#[inline(always)]
fn pack_color(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (r as u32) | ((g as u32) << 8) | ((b as u32) << 16) | ((a as u32) << 24)
}

#[inline(always)]
fn unpack_color(packed: u32) -> [u8; 4] {
    packed.to_le_bytes()
}

/// Sequential palette extraction for small images.
fn extract_palette_sequential(pixels: &[u8]) -> Option<(Vec<[u8; 4]>, Vec<u8>)> {
    let mut color_to_index: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette: Vec<[u8; 4]> = Vec::with_capacity(MAX_PALETTE_SIZE);
    let mut indices: Vec<u8> = Vec::with_capacity(pixels.len() / 4);

    for chunk in pixels.chunks_exact(4) {
        let packed = pack_color(chunk[0], chunk[1], chunk[2], chunk[3]);

        let index = match color_to_index.get(&packed) {
            Some(&idx) => idx,
            None => {
                if palette.len() >= MAX_PALETTE_SIZE {
                    return None;
                }
                let idx = palette.len() as u8;
                palette.push([chunk[0], chunk[1], chunk[2], chunk[3]]);
                color_to_index.insert(packed, idx);
                idx
            }
        };
        indices.push(index);
    }

    Some((palette, indices))
}

/// Parallel palette extraction for larger images.
///
/// Unique colors are collected per chunk, merged and sorted so the palette
/// order does not depend on thread scheduling, then pixels are mapped to
/// indices in a second parallel pass.
fn extract_palette_parallel(pixels: &[u8]) -> Option<(Vec<[u8; 4]>, Vec<u8>)> {
    let chunk_size = (pixels.len() / 4 / rayon::current_num_threads()).max(256) * 4;

    let mut unique_colors: Vec<u32> = pixels
        .par_chunks(chunk_size)
        .flat_map(|chunk| {
            let mut local_colors: HashMap<u32, ()> = HashMap::with_capacity(MAX_PALETTE_SIZE);
            for pixel in chunk.chunks_exact(4) {
                let packed = pack_color(pixel[0], pixel[1], pixel[2], pixel[3]);
                local_colors.insert(packed, ());
                if local_colors.len() > MAX_PALETTE_SIZE {
                    break;
                }
            }
            local_colors.into_keys().collect::<Vec<_>>()
        })
        .collect();

    unique_colors.sort_unstable();
    unique_colors.dedup();
    if unique_colors.len() > MAX_PALETTE_SIZE {
        return None;
    }

    let global_colors: HashMap<u32, u8> = unique_colors
        .iter()
        .enumerate()
        .map(|(idx, &packed)| (packed, idx as u8))
        .collect();
    let palette: Vec<[u8; 4]> = unique_colors.iter().map(|&p| unpack_color(p)).collect();

    let num_pixels = pixels.len() / 4;
    let mut indices = vec![0u8; num_pixels];

    indices
        .par_chunks_mut(chunk_size / 4)
        .enumerate()
        .for_each(|(chunk_idx, idx_chunk)| {
            let pixel_start = chunk_idx * (chunk_size / 4) * 4;
            for (i, idx) in idx_chunk.iter_mut().enumerate() {
                let pixel_offset = pixel_start + i * 4;
                if pixel_offset + 3 < pixels.len() {
                    let packed = pack_color(
                        pixels[pixel_offset],
                        pixels[pixel_offset + 1],
                        pixels[pixel_offset + 2],
                        pixels[pixel_offset + 3],
                    );
                    *idx = *global_colors.get(&packed).unwrap_or(&0);
                }
            }
        });

    Some((palette, indices))
}

/// Create an indexed PNG (color type 3) from palette and indices.
pub fn create_png_indexed(
    width: usize,
    height: usize,
    palette: &[[u8; 4]],
    indices: &[u8],
) -> RenderResult<Vec<u8>> {
    if indices.len() < width * height {
        return Err(RenderError::Encode(format!(
            "{} indices for a {}x{} image",
            indices.len(),
            width,
            height
        )));
    }

    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);

    // IHDR chunk
    let mut ihdr_data = Vec::with_capacity(13);
    ihdr_data.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr_data.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr_data.push(8); // bit depth (8 bits per palette index)
    ihdr_data.push(3); // color type 3 = indexed
    ihdr_data.push(0); // compression method
    ihdr_data.push(0); // filter method
    ihdr_data.push(0); // interlace method
    write_chunk(&mut png, b"IHDR", &ihdr_data);

    // PLTE chunk (palette)
    let plte_data: Vec<u8> = palette
        .iter()
        .flat_map(|[r, g, b, _]| [*r, *g, *b])
        .collect();
    write_chunk(&mut png, b"PLTE", &plte_data);

    // tRNS chunk - only if any color has alpha < 255
    if palette.iter().any(|[_, _, _, a]| *a < 255) {
        let trns_data: Vec<u8> = palette.iter().map(|[_, _, _, a]| *a).collect();
        write_chunk(&mut png, b"tRNS", &trns_data);
    }

    let idat_data = deflate_scanlines(indices, width, height, 1)?;
    write_chunk(&mut png, b"IDAT", &idat_data);

    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Create a PNG image from RGBA pixel data (color type 6).
pub fn create_png(pixels: &[u8], width: usize, height: usize) -> RenderResult<Vec<u8>> {
    if pixels.len() < width * height * 4 {
        return Err(RenderError::Encode(format!(
            "{} bytes for a {}x{} RGBA image",
            pixels.len(),
            width,
            height
        )));
    }

    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);

    let mut ihdr_data = Vec::with_capacity(13);
    ihdr_data.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr_data.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr_data.push(8); // bit depth
    ihdr_data.push(6); // color type (RGBA)
    ihdr_data.push(0); // compression method
    ihdr_data.push(0); // filter method
    ihdr_data.push(0); // interlace method
    write_chunk(&mut png, b"IHDR", &ihdr_data);

    let idat_data = deflate_scanlines(pixels, width, height, 4)?;
    write_chunk(&mut png, b"IDAT", &idat_data);

    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Write a PNG chunk
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let crc_data = [chunk_type.as_slice(), data].concat();
    png.extend_from_slice(&crc32fast::hash(&crc_data).to_be_bytes());
}

/// Deflate image rows for the IDAT chunk, filter type 0 on every scanline.
fn deflate_scanlines(
    data: &[u8],
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
) -> RenderResult<Vec<u8>> {
    let stride = width * bytes_per_pixel;
    let mut uncompressed = Vec::with_capacity(height * (1 + stride));
    for y in 0..height {
        uncompressed.push(0); // filter type: none
        uncompressed.extend_from_slice(&data[y * stride..(y + 1) * stride]);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder
        .write_all(&uncompressed)
        .and_then(|_| encoder.finish())
        .map_err(|e| RenderError::Encode(format!("IDAT compression failed: {}", e)))
}

// =============================================================================
// Indexed PNG decoding
// =============================================================================

struct Header {
    width: u32,
    height: u32,
    bit_depth: u8,
    color_type: u8,
    interlace: u8,
}

impl Header {
    /// Packed bytes per scanline, without the filter byte.
    fn stride(&self) -> usize {
        (self.width as usize * self.bit_depth as usize + 7) / 8
    }

    /// Size of the inflated IDAT stream: one filter byte plus a packed row
    /// per scanline.
    fn inflated_len(&self) -> u64 {
        self.height as u64 * (self.stride() as u64 + 1)
    }
}

/// Check the signature and IHDR for an indexed PNG without inflating anything.
pub fn is_indexed_png(data: &[u8]) -> bool {
    data.len() >= 33
        && data[..8] == PNG_SIGNATURE
        && &data[12..16] == b"IHDR"
        && data[25] == 3
}

/// Decode an indexed PNG keeping its palette.
///
/// Returns `Ok(None)` for PNGs this decoder does not handle (other colour
/// types, interlaced images) so callers can fall back to a general decoder.
pub fn decode_indexed(data: &[u8]) -> RenderResult<Option<PalettedImage>> {
    if data.len() < 8 || data[..8] != PNG_SIGNATURE {
        return Err(RenderError::Decode("missing PNG signature".to_string()));
    }

    let mut header: Option<Header> = None;
    let mut palette: Vec<[u8; 4]> = Vec::new();
    let mut alphas: Vec<u8> = Vec::new();
    let mut idat: Vec<u8> = Vec::new();

    let mut pos = 8;
    loop {
        if pos + 8 > data.len() {
            return Err(RenderError::Decode("truncated PNG chunk header".to_string()));
        }
        let length = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
            as usize;
        let chunk_type = &data[pos + 4..pos + 8];
        let body_start = pos + 8;
        let body_end = body_start
            .checked_add(length)
            .filter(|end| end + 4 <= data.len())
            .ok_or_else(|| RenderError::Decode("truncated PNG chunk".to_string()))?;
        let body = &data[body_start..body_end];

        let stored_crc = u32::from_be_bytes([
            data[body_end],
            data[body_end + 1],
            data[body_end + 2],
            data[body_end + 3],
        ]);
        if crc32fast::hash(&data[pos + 4..body_end]) != stored_crc {
            return Err(RenderError::Decode(format!(
                "CRC mismatch in {} chunk",
                String::from_utf8_lossy(chunk_type)
            )));
        }

        match chunk_type {
            b"IHDR" => {
                if body.len() != 13 {
                    return Err(RenderError::Decode("malformed IHDR".to_string()));
                }
                let parsed = Header {
                    width: u32::from_be_bytes([body[0], body[1], body[2], body[3]]),
                    height: u32::from_be_bytes([body[4], body[5], body[6], body[7]]),
                    bit_depth: body[8],
                    color_type: body[9],
                    interlace: body[12],
                };
                if parsed.color_type != 3 || parsed.interlace != 0 {
                    return Ok(None);
                }
                if !matches!(parsed.bit_depth, 1 | 2 | 4 | 8) {
                    return Err(RenderError::Decode(format!(
                        "invalid bit depth {} for indexed PNG",
                        parsed.bit_depth
                    )));
                }
                header = Some(parsed);
            }
            b"PLTE" => {
                palette = body
                    .chunks_exact(3)
                    .map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
                    .collect();
            }
            b"tRNS" => alphas = body.to_vec(),
            b"IDAT" => idat.extend_from_slice(body),
            b"IEND" => break,
            _ => {}
        }

        pos = body_end + 4;
    }

    let header = header.ok_or_else(|| RenderError::Decode("missing IHDR".to_string()))?;
    if palette.is_empty() {
        return Err(RenderError::Decode("indexed PNG without PLTE".to_string()));
    }
    for (entry, alpha) in palette.iter_mut().zip(alphas) {
        entry[3] = alpha;
    }

    // Inflate at most one byte past what the header allows
    let expected = header.inflated_len();
    let mut raw = Vec::new();
    flate2::read::ZlibDecoder::new(idat.as_slice())
        .take(expected + 1)
        .read_to_end(&mut raw)
        .map_err(|e| RenderError::Decode(format!("IDAT inflate failed: {}", e)))?;
    if raw.len() as u64 > expected {
        return Err(RenderError::Decode(format!(
            "IDAT inflates past the {} bytes a {}x{} image holds",
            expected, header.width, header.height
        )));
    }

    let indices = unfilter_indexed(&raw, &header)?;
    PalettedImage::new(header.width, header.height, palette, indices).map(Some)
}

/// Undo scanline filters and unpack sub-byte indices.
fn unfilter_indexed(raw: &[u8], header: &Header) -> RenderResult<Vec<u8>> {
    let width = header.width as usize;
    let height = header.height as usize;
    let depth = header.bit_depth as usize;
    let stride = header.stride();

    if raw.len() < height * (stride + 1) {
        return Err(RenderError::Decode(format!(
            "IDAT holds {} bytes, expected {}",
            raw.len(),
            height * (stride + 1)
        )));
    }

    // Indexed images always filter with a 1-byte pixel distance
    let mut prev = vec![0u8; stride];
    let mut row = vec![0u8; stride];
    let mut indices = Vec::with_capacity(width * height);

    for y in 0..height {
        let line = &raw[y * (stride + 1)..(y + 1) * (stride + 1)];
        let filter = line[0];
        row.copy_from_slice(&line[1..]);

        for i in 0..stride {
            let left = if i > 0 { row[i - 1] } else { 0 };
            let up = prev[i];
            let up_left = if i > 0 { prev[i - 1] } else { 0 };
            let predictor = match filter {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((left as u16 + up as u16) / 2) as u8,
                4 => paeth(left, up, up_left),
                other => {
                    return Err(RenderError::Decode(format!("unknown filter type {}", other)))
                }
            };
            row[i] = row[i].wrapping_add(predictor);
        }

        if depth == 8 {
            indices.extend_from_slice(&row[..width]);
        } else {
            let mask = (1u8 << depth) - 1;
            for x in 0..width {
                let bit = x * depth;
                let shift = 8 - depth - (bit % 8);
                indices.push((row[bit / 8] >> shift) & mask);
            }
        }

        std::mem::swap(&mut prev, &mut row);
    }

    Ok(indices)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
