use image::imageops;
use image::metadata::Orientation;
use image::{codecs::jpeg::JpegDecoder, DynamicImage, ImageDecoder, ImageFormat};
use std::fs;
use std::io::Cursor;
use std::path::Path;

const CONTRAST_BOOST: f32 = 12.0;

/// 对字节数据进行预处理（按EXIF旋转、灰度、对比度增强），输出PNG
pub fn preprocess_bytes(input: &[u8]) -> Option<Vec<u8>> {
    let format = image::guess_format(input).ok()?;
    let mut image = image::load_from_memory(input).ok()?;

    if let Some(orientation) = read_orientation(input, format) {
        image.apply_orientation(orientation);
    }

    let enhanced = enhance_contrast(image);
    let mut cursor = Cursor::new(Vec::new());
    enhanced.write_to(&mut cursor, ImageFormat::Png).ok()?;
    Some(cursor.into_inner())
}

/// 预处理 `src` 并写入 `dest`，原始上传文件保持不变。
/// 返回 false 表示无法解码，调用方应直接使用原图
pub fn preprocess_file_to(src: &Path, dest: &Path) -> std::io::Result<bool> {
    let bytes = fs::read(src)?;
    let Some(processed) = preprocess_bytes(&bytes) else {
        return Ok(false);
    };
    fs::write(dest, processed)?;
    Ok(true)
}

fn enhance_contrast(image: DynamicImage) -> DynamicImage {
    // 小票多为热敏纸，灰度后拉高对比度对 tesseract 更友好
    let gray = image.to_luma8();
    let adjusted = imageops::contrast(&gray, CONTRAST_BOOST);
    DynamicImage::ImageLuma8(adjusted)
}

fn read_orientation(bytes: &[u8], format: ImageFormat) -> Option<Orientation> {
    match format {
        ImageFormat::Jpeg => {
            let cursor = Cursor::new(bytes);
            let mut decoder = JpegDecoder::new(cursor).ok()?;
            decoder
                .orientation()
                .ok()
                .filter(|orientation| *orientation != Orientation::NoTransforms)
        }
        _ => None,
    }
}
