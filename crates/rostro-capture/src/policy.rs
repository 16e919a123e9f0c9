//! Capture policy — square crop and fixed JPEG quality.

use image::codecs::jpeg::JpegEncoder;
use image::ImageResult;

/// Shape and compression applied to every acquired image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturePolicy {
    /// Width:height ratio of the crop.
    pub aspect: (u32, u32),
    /// JPEG quality, 1–100.
    pub quality: u8,
}

/// Keeps the upload size predictable; not adjustable per acquisition.
pub const CAPTURE_POLICY: CapturePolicy = CapturePolicy {
    aspect: (1, 1),
    quality: 70,
};

impl CapturePolicy {
    /// Largest centered rectangle with the policy aspect: `(x, y, w, h)`.
    pub fn crop_rect(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let (aw, ah) = (self.aspect.0.max(1) as u64, self.aspect.1.max(1) as u64);
        let (w, h) = (width as u64, height as u64);

        let (cw, ch) = if w * ah > h * aw {
            (h * aw / ah, h)
        } else {
            (w, w * ah / aw)
        };

        (
            ((w - cw) / 2) as u32,
            ((h - ch) / 2) as u32,
            cw as u32,
            ch as u32,
        )
    }

    /// Decode `raw`, crop it to the policy aspect and re-encode as JPEG.
    pub fn apply(&self, raw: &[u8]) -> ImageResult<Vec<u8>> {
        let img = image::load_from_memory(raw)?;
        let (x, y, w, h) = self.crop_rect(img.width(), img.height());
        // JPEG has no alpha channel.
        let cropped = img.crop_imm(x, y, w, h).to_rgb8();

        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, self.quality).encode_image(&cropped)?;

        tracing::debug!(
            src_width = img.width(),
            src_height = img.height(),
            side = w,
            bytes = out.len(),
            "image normalized"
        );
        Ok(out)
    }
}
