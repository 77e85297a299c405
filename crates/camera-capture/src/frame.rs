//! Video frame types and processing

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageError};

/// Decoded RGB video frame
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Create a frame filled with a single color
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * 3);
        for _ in 0..pixels {
            data.extend_from_slice(&rgb);
        }
        Self::new(data, width, height, 0, 0)
    }

    /// A frame is usable when it has non-zero dimensions and exactly
    /// three bytes per pixel.
    pub fn is_valid(&self) -> bool {
        if self.width == 0 || self.height == 0 || self.data.is_empty() {
            return false;
        }
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|p| p.checked_mul(3))
            .map_or(false, |expected| expected == self.data.len())
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        let px = self.data.get(idx..idx + 3)?;
        Some([px[0], px[1], px[2]])
    }

    /// Convert to grayscale
    pub fn to_grayscale(&self) -> Vec<u8> {
        let mut gray = Vec::with_capacity(self.data.len() / 3);
        for pixel in self.data.chunks_exact(3) {
            // Luminance formula: 0.299*R + 0.587*G + 0.114*B
            let y = (pixel[0] as f32 * 0.299
                   + pixel[1] as f32 * 0.587
                   + pixel[2] as f32 * 0.114) as u8;
            gray.push(y);
        }
        gray
    }

    /// Crop a region of the frame
    pub fn crop(&self, x: u32, y: u32, w: u32, h: u32) -> Option<VideoFrame> {
        if w == 0 || h == 0 || !self.is_valid() {
            return None;
        }
        if x.checked_add(w)? > self.width || y.checked_add(h)? > self.height {
            return None;
        }

        let mut cropped = Vec::with_capacity(w as usize * h as usize * 3);
        for row in y..(y + h) {
            let start = (row as usize * self.width as usize + x as usize) * 3;
            let end = start + w as usize * 3;
            cropped.extend_from_slice(&self.data[start..end]);
        }

        Some(VideoFrame {
            data: cropped,
            width: w,
            height: h,
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        })
    }

    /// Resize frame (nearest neighbour)
    pub fn resize(&self, new_width: u32, new_height: u32) -> VideoFrame {
        let mut resized = Vec::with_capacity(new_width as usize * new_height as usize * 3);

        if self.width > 0 && self.height > 0 {
            let x_ratio = self.width as f32 / new_width.max(1) as f32;
            let y_ratio = self.height as f32 / new_height.max(1) as f32;

            for y in 0..new_height {
                for x in 0..new_width {
                    let x0 = ((x as f32 * x_ratio).floor() as u32).min(self.width - 1);
                    let y0 = ((y as f32 * y_ratio).floor() as u32).min(self.height - 1);
                    let pixel = self.get_pixel(x0, y0).unwrap_or([0, 0, 0]);
                    resized.extend_from_slice(&pixel);
                }
            }
        } else {
            resized.resize(new_width as usize * new_height as usize * 3, 0);
        }

        VideoFrame {
            data: resized,
            width: new_width,
            height: new_height,
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        }
    }

    /// Encode the frame as a baseline JPEG
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, ImageError> {
        let mut out = Vec::with_capacity(self.data.len() / 8);
        JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).encode(
            &self.data,
            self.width,
            self.height,
            ExtendedColorType::Rgb8,
        )?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_validation() {
        assert!(VideoFrame::filled(4, 3, [1, 2, 3]).is_valid());
        assert!(!VideoFrame::new(vec![], 0, 0, 0, 0).is_valid());
        // Single-channel buffer
        assert!(!VideoFrame::new(vec![0; 12], 4, 3, 0, 0).is_valid());
    }

    #[test]
    fn test_crop_bounds() {
        let frame = VideoFrame::filled(10, 10, [9, 9, 9]);
        let crop = frame.crop(2, 3, 4, 5).unwrap();
        assert_eq!((crop.width, crop.height), (4, 5));
        assert_eq!(crop.data.len(), 4 * 5 * 3);
        assert!(frame.crop(8, 0, 4, 4).is_none());
        assert!(frame.crop(u32::MAX, 0, 4, 4).is_none());
    }

    #[test]
    fn test_grayscale_and_resize() {
        let frame = VideoFrame::filled(8, 8, [255, 255, 255]);
        assert!(frame.to_grayscale().iter().all(|&v| v >= 254));

        let small = frame.resize(2, 2);
        assert!(small.is_valid());
        assert_eq!(small.get_pixel(1, 1), Some([255, 255, 255]));
    }

    #[test]
    fn test_encode_jpeg() {
        let frame = VideoFrame::filled(16, 16, [200, 10, 10]);
        let jpeg = frame.encode_jpeg(90).unwrap();
        // SOI marker
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    fn patterned(width: u32, height: u32) -> VideoFrame {
        let data = (0..width as usize * height as usize * 3).map(|i| (i % 251) as u8).collect();
        VideoFrame::new(data, width, height, 0, 0)
    }

    proptest! {
        #[test]
        fn crop_is_some_exactly_when_in_bounds(
            width in 1u32..32,
            height in 1u32..32,
            x in 0u32..40,
            y in 0u32..40,
            w in 0u32..40,
            h in 0u32..40,
        ) {
            let frame = patterned(width, height);
            let in_bounds = w > 0 && h > 0 && x + w <= width && y + h <= height;

            match frame.crop(x, y, w, h) {
                Some(crop) => {
                    prop_assert!(in_bounds);
                    prop_assert!(crop.is_valid());
                    prop_assert_eq!((crop.width, crop.height), (w, h));
                    prop_assert_eq!(crop.get_pixel(0, 0), frame.get_pixel(x, y));
                    prop_assert_eq!(crop.get_pixel(w - 1, h - 1), frame.get_pixel(x + w - 1, y + h - 1));
                }
                None => prop_assert!(!in_bounds),
            }
        }

        #[test]
        fn resize_yields_valid_frame(
            width in 1u32..32,
            height in 1u32..32,
            new_width in 1u32..64,
            new_height in 1u32..64,
        ) {
            let resized = patterned(width, height).resize(new_width, new_height);
            prop_assert!(resized.is_valid());
            prop_assert_eq!((resized.width, resized.height), (new_width, new_height));
        }
    }
}
