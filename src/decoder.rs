//! Frame decoding
//!
//! A [`FrameDecoder`] turns a compressed frame into rectangular blocks of
//! RGB565 pixels and hands each one to a sink. [`decode`] wires that sink to
//! a [`PixelBuffer`], copying each block in big-endian order and clipping
//! whatever falls outside the buffer.
//!
//! The buffer is cleared before decoding starts and cleared again if the
//! decoder fails, so a partial image never reaches the display.

use core::fmt::Debug;

use log::warn;

use crate::error::{DecodeError, SizeError};

/// Rectangle of decoded pixels
#[derive(Clone, Copy, Debug)]
pub struct Block<'a> {
    /// Left edge, may be negative
    pub x: i32,
    /// Top edge, may be negative
    pub y: i32,
    /// Columns in `pixels`
    pub width: u16,
    /// Rows in `pixels`
    pub height: u16,
    /// Row-major RGB565 values
    pub pixels: &'a [u16],
}

/// Compressed-frame decoder backend
pub trait FrameDecoder {
    /// Backend error
    type Error: Debug;

    /// Decode `data`, calling `sink` once per block in any order
    ///
    /// The backend stops early when `sink` returns `false`.
    fn decode(
        &mut self,
        data: &[u8],
        sink: &mut dyn FnMut(&Block<'_>) -> bool,
    ) -> Result<(), Self::Error>;
}

/// Fixed-size RGB565 image matching the display's addressable region
pub struct PixelBuffer<B> {
    buf: B,
    width: u16,
    height: u16,
}

impl<B> PixelBuffer<B>
where
    B: AsRef<[u8]> + AsMut<[u8]>,
{
    /// Wrap `buf`, which must be exactly `width * height * 2` bytes
    pub fn new(buf: B, width: u16, height: u16) -> Result<Self, SizeError> {
        let required = width as usize * height as usize * 2;
        let provided = buf.as_ref().len();
        if provided != required {
            return Err(SizeError { required, provided });
        }
        Ok(Self { buf, width, height })
    }

    /// Width in pixels
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Raw big-endian RGB565 bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_ref()
    }

    /// Set every pixel to zero
    pub fn clear(&mut self) {
        self.buf.as_mut().fill(0);
    }

    /// Copy `block` into the buffer, clipping to the bounds
    pub fn blit(&mut self, block: &Block<'_>) {
        let width = i32::from(self.width);
        let height = i32::from(self.height);
        let block_width = usize::from(block.width);
        let dst = self.buf.as_mut();

        for row in 0..i32::from(block.height) {
            let y = block.y + row;
            if y < 0 {
                continue;
            }
            if y >= height {
                break;
            }
            let start = row as usize * block_width;
            let Some(line) = block.pixels.get(start..start + block_width) else {
                break;
            };
            for (col, &pixel) in line.iter().enumerate() {
                let x = block.x + col as i32;
                if x < 0 {
                    continue;
                }
                if x >= width {
                    break;
                }
                let offset = (y as usize * self.width as usize + x as usize) * 2;
                dst[offset..offset + 2].copy_from_slice(&pixel.to_be_bytes());
            }
        }
    }
}

/// Decode `frame` into `pixels`
pub fn decode<D, B>(
    decoder: &mut D,
    frame: &[u8],
    pixels: &mut PixelBuffer<B>,
) -> Result<(), DecodeError<D::Error>>
where
    D: FrameDecoder,
    B: AsRef<[u8]> + AsMut<[u8]>,
{
    pixels.clear();
    if frame.is_empty() {
        return Err(DecodeError::EmptyFrame);
    }
    let result = decoder.decode(frame, &mut |block| {
        pixels.blit(block);
        true
    });
    if let Err(e) = result {
        warn!("decode failed: {:?}", e);
        pixels.clear();
        return Err(DecodeError::Backend(e));
    }
    Ok(())
}

/// JPEG backend built on the `image` crate
#[cfg(feature = "jpeg")]
pub mod jpeg {
    use alloc::vec::Vec;

    use image::{ImageError, ImageFormat};

    use super::{Block, FrameDecoder};
    use crate::color::Color;

    /// Rows per emitted block, one MCU row at 4:2:0 subsampling
    pub const BLOCK_ROWS: u32 = 16;

    /// Decodes baseline JPEG and emits full-width 16-row strips
    #[derive(Debug, Default)]
    pub struct JpegDecoder {
        strip: Vec<u16>,
    }

    impl JpegDecoder {
        /// Create a decoder with an empty strip buffer
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl FrameDecoder for JpegDecoder {
        type Error = ImageError;

        fn decode(
            &mut self,
            data: &[u8],
            sink: &mut dyn FnMut(&Block<'_>) -> bool,
        ) -> Result<(), Self::Error> {
            let image = image::load_from_memory_with_format(data, ImageFormat::Jpeg)?.to_rgb8();
            let (width, height) = image.dimensions();

            for top in (0..height).step_by(BLOCK_ROWS as usize) {
                let rows = BLOCK_ROWS.min(height - top);
                self.strip.clear();
                for y in top..top + rows {
                    for x in 0..width {
                        let [r, g, b] = image.get_pixel(x, y).0;
                        self.strip.push(Color::from_rgb888(r, g, b).raw());
                    }
                }
                let block = Block {
                    x: 0,
                    y: top as i32,
                    width: width as u16,
                    height: rows as u16,
                    pixels: &self.strip,
                };
                if !sink(&block) {
                    break;
                }
            }
            Ok(())
        }
    }
}
