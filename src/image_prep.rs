use std::io::Cursor;

use base64::Engine;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageOutputFormat};

use crate::config::ImageSettings;
use crate::error::ServiceError;
use crate::models::ImageData;

const ACCEPTED_MIME: &[&str] = &["image/png", "image/jpeg", "image/jpg"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
  Png,
  Jpeg,
}

impl Encoding {
  pub fn mime(self) -> &'static str {
    match self {
      Encoding::Png => "image/png",
      Encoding::Jpeg => "image/jpeg",
    }
  }
}

/// A decoded upload, already converted to RGB and bounded in size.
pub struct PreparedImage {
  image: DynamicImage,
  jpeg_quality: u8,
}

impl PreparedImage {
  pub fn dimensions(&self) -> (u32, u32) {
    self.image.dimensions()
  }

  pub fn encode(&self, encoding: Encoding) -> image::ImageResult<ImageData> {
    let format = match encoding {
      Encoding::Png => ImageOutputFormat::Png,
      Encoding::Jpeg => ImageOutputFormat::Jpeg(self.jpeg_quality),
    };
    let mut bytes = Vec::new();
    self.image.write_to(&mut Cursor::new(&mut bytes), format)?;
    let base64 = base64::engine::general_purpose::STANDARD.encode(bytes);

    Ok(ImageData {
      mime: encoding.mime().to_string(),
      base64,
    })
  }
}

/// Decode the base64 payload of an upload. A `data:` URI prefix is tolerated.
pub fn decode_upload(data: &ImageData) -> Result<Vec<u8>, ServiceError> {
  let mime = data.mime.trim().to_ascii_lowercase();
  if !mime.is_empty() && !ACCEPTED_MIME.contains(&mime.as_str()) {
    return Err(ServiceError::InvalidImage(format!(
      "unsupported type '{mime}', expected PNG or JPEG"
    )));
  }

  let payload = match data.base64.split_once(',') {
    Some((prefix, rest)) if prefix.starts_with("data:") => rest,
    _ => data.base64.as_str(),
  };
  base64::engine::general_purpose::STANDARD
    .decode(payload.trim())
    .map_err(|err| ServiceError::InvalidImage(format!("bad base64 payload: {err}")))
}

pub fn prepare(bytes: &[u8], settings: &ImageSettings) -> Result<PreparedImage, ServiceError> {
  let format = image::guess_format(bytes)
    .map_err(|_| ServiceError::InvalidImage("unrecognized image data".to_string()))?;
  if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
    return Err(ServiceError::InvalidImage(format!(
      "unsupported format {format:?}, expected PNG or JPEG"
    )));
  }

  let decoded = image::load_from_memory_with_format(bytes, format)
    .map_err(|err| ServiceError::InvalidImage(err.to_string()))?;
  let mut image = DynamicImage::ImageRgb8(decoded.to_rgb8());

  if let Some(edge) = settings.normalize_to.filter(|edge| *edge > 0) {
    let (width, height) = image.dimensions();
    if width > edge || height > edge {
      image = image.resize(edge, edge, FilterType::Triangle);
    }
  }

  Ok(PreparedImage {
    image,
    jpeg_quality: settings.jpeg_quality,
  })
}

#[cfg(test)]
pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
  let image = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
    width,
    height,
    image::Rgb([120, 90, 200]),
  ));
  let mut bytes = Vec::new();
  image
    .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
    .expect("encode sample png");
  bytes
}
