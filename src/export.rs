//! Blend mask export.

use std::path::{Path, PathBuf};

use image::{ImageBuffer, Luma, Primitive};

use crate::blending::BlendMask;
use crate::error::Result;

/// Grayscale image of `mask`, weights scaled so 1.0 maps to `full`.
fn mask_image<P: Primitive>(
    mask: &BlendMask,
    full: f32,
    quantize: impl Fn(f32) -> P,
) -> ImageBuffer<Luma<P>, Vec<P>> {
    ImageBuffer::from_fn(mask.width, mask.height, |x, y| {
        let weight = mask.value(x, y).unwrap_or(0.0).clamp(0.0, 1.0);
        Luma([quantize((weight * full).round())])
    })
}

/// Writes blend masks as grayscale PNG images.
pub struct MaskExporter;

impl MaskExporter {
    /// 8-bit grayscale PNG.
    pub fn export_blend_mask(mask: &BlendMask, path: &Path) -> Result<()> {
        mask_image(mask, u8::MAX as f32, |v| v as u8).save(path)?;
        Ok(())
    }

    /// 16-bit grayscale PNG, for media servers that take deep masks.
    pub fn export_blend_mask_16bit(mask: &BlendMask, path: &Path) -> Result<()> {
        mask_image(mask, u16::MAX as f32, |v| v as u16).save(path)?;
        Ok(())
    }

    /// Export every mask into `output_dir`, one file per projector.
    pub fn export_all_blend_masks(
        masks: &[BlendMask],
        output_dir: &Path,
        use_16bit: bool,
    ) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(output_dir)?;

        let mut written = Vec::with_capacity(masks.len());
        for mask in masks {
            let filename = format!("blend_mask_projector_{}.png", mask.slot);
            let path = output_dir.join(&filename);

            if use_16bit {
                Self::export_blend_mask_16bit(mask, &path)?;
            } else {
                Self::export_blend_mask(mask, &path)?;
            }

            log::info!("Exported blend mask: {}", filename);
            written.push(path);
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blending::BlendTunables;
    use crate::config::{Layout, Rotation};
    use crate::layout::configure;

    fn masks() -> Vec<BlendMask> {
        let config = configure(32, 16, 2, &[8.0], Layout::Horizontal, Rotation::None).unwrap();
        let tunables = BlendTunables::new(config.overlaps());
        config
            .slots(&tunables.overlaps())
            .iter()
            .map(|slot| BlendMask::for_slot(slot, &tunables))
            .collect()
    }

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("projector-blend-{}-{}", name, std::process::id()))
    }

    #[test]
    fn test_mask_image_scales_to_depth() {
        let mask = BlendMask {
            slot: 0,
            width: 3,
            height: 1,
            data: vec![0.0, 0.5, 1.0],
        };
        let deep = mask_image(&mask, u16::MAX as f32, |v| v as u16);
        assert_eq!(deep.as_raw(), &vec![0, 32768, 65535]);
        let shallow = mask_image(&mask, u8::MAX as f32, |v| v as u8);
        assert_eq!(shallow.as_raw(), &vec![0, 128, 255]);
    }

    #[test]
    fn test_export_all_8bit() {
        let dir = scratch_dir("masks8");
        let paths = MaskExporter::export_all_blend_masks(&masks(), &dir, false).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[1].ends_with("blend_mask_projector_1.png"));

        let img = image::open(&paths[0]).unwrap().to_luma8();
        assert_eq!(img.dimensions(), (32, 16));
        assert_eq!(img.get_pixel(0, 0)[0], 255);
        assert!(img.get_pixel(31, 0)[0] < 255);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_export_16bit_keeps_precision() {
        let dir = scratch_dir("masks16");
        let paths = MaskExporter::export_all_blend_masks(&masks(), &dir, true).unwrap();

        let img = image::open(&paths[1]).unwrap().to_luma16();
        assert_eq!(img.dimensions(), (32, 16));
        assert_eq!(img.get_pixel(31, 8)[0], 65535);
        let edge = img.get_pixel(0, 8)[0];
        assert!(edge > 0 && edge < 65535);

        std::fs::remove_dir_all(&dir).ok();
    }
}
