// Texture loading
//
// Decodes image files into tightly packed 8-bit texels ready to be copied
// into a staging buffer.

use std::path::Path;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub components: u32,
    pub data: Vec<u8>,
}

/// Load `path` with `requested_components` channels per texel (1 to 4).
/// `0` keeps the file's own channel count.
pub fn load_texture_data(path: impl AsRef<Path>, requested_components: u32) -> Result<TextureData> {
    let path = path.as_ref();
    if requested_components > 4 {
        anyhow::bail!("Texture components must be between 0 and 4, got {}", requested_components);
    }

    let image = image::ImageReader::open(path)
        .with_context(|| format!("Could not open texture {}", path.display()))?
        .decode()
        .with_context(|| format!("Could not decode texture {}", path.display()))?;

    let components = match requested_components {
        0 => u32::from(image.color().channel_count()).min(4),
        n => n,
    };

    let (width, height) = (image.width(), image.height());
    let data = match components {
        1 => image.into_luma8().into_raw(),
        2 => image.into_luma_alpha8().into_raw(),
        3 => image.into_rgb8().into_raw(),
        _ => image.into_rgba8().into_raw(),
    };

    log::debug!(
        "Loaded texture {} ({}x{}, {} components)",
        path.display(),
        width,
        height,
        components
    );

    Ok(TextureData {
        width,
        height,
        components,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_rgb_png(name: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        let img = image::RgbImage::from_fn(4, 2, |x, _| image::Rgb([x as u8 * 10, 20, 30]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn keeps_file_components_when_zero() {
        let path = write_rgb_png("vulkan_cookbook_texture_keep.png");
        let texture = load_texture_data(&path, 0).unwrap();

        assert_eq!((texture.width, texture.height), (4, 2));
        assert_eq!(texture.components, 3);
        assert_eq!(texture.data.len(), 4 * 2 * 3);
        assert_eq!(&texture.data[3..6], &[10, 20, 30]);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn converts_to_requested_components() {
        let path = write_rgb_png("vulkan_cookbook_texture_rgba.png");
        let texture = load_texture_data(&path, 4).unwrap();

        assert_eq!(texture.components, 4);
        assert_eq!(texture.data.len(), 4 * 2 * 4);
        assert_eq!(texture.data[3], 255);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn rejects_bad_requests() {
        assert!(load_texture_data("does/not/exist.png", 4).is_err());
        assert!(load_texture_data("whatever.png", 5).is_err());
    }
}
