use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use indicatif::ProgressStyle;

/// 存储的图片数据统一为 JPEG
pub const STORED_MIME_TYPE: &str = "image/jpeg";

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template("{elapsed_precise} {wide_bar:.cyan/blue} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// 将图片数据编码为 data URL
pub fn data_url(image_data: &[u8]) -> String {
    format!("data:{STORED_MIME_TYPE};base64,{}", STANDARD.encode(image_data))
}
