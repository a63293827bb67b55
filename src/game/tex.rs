use std::path::Path;

/// CPU 端 RGBA 纹理数据
#[derive(Clone)]
pub struct TextureData {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// 将解码后的纹理写为 PNG
pub fn save_png(tex: &TextureData, path: &Path) -> Result<(), String> {
    let image = image::RgbaImage::from_raw(tex.width, tex.height, tex.rgba.clone())
        .ok_or_else(|| format!("纹理数据长度与 {}x{} 不符", tex.width, tex.height))?;
    image
        .save(path)
        .map_err(|e| format!("写入 {} 失败: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_roundtrips_dimensions() {
        let tex = TextureData {
            rgba: vec![255, 0, 0, 255, 0, 255, 0, 255],
            width: 2,
            height: 1,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        save_png(&tex, &path).unwrap();

        let loaded = image::open(&path).unwrap();
        assert_eq!(loaded.width(), 2);
        assert_eq!(loaded.height(), 1);
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        let tex = TextureData {
            rgba: vec![0; 3],
            width: 4,
            height: 4,
        };
        let dir = tempfile::tempdir().unwrap();
        assert!(save_png(&tex, &dir.path().join("bad.png")).is_err());
    }
}
