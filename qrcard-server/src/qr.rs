//! QR image emitter
//!
//! Wraps the `qrcode` encoder with fixed rendering parameters: black modules
//! on white, `module_size` pixels per module and a `border`-module quiet zone.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use qrcode::types::QrError;
use qrcode::{Color, EcLevel, QrCode};
use qrcard_common::config::{ErrorCorrection, QrSettings};
use qrcard_common::{Error, Result};
use tracing::debug;

const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);

/// Renders payloads as PNG QR codes
#[derive(Debug, Clone)]
pub struct QrEmitter {
    settings: QrSettings,
}

impl QrEmitter {
    pub fn new(settings: QrSettings) -> Self {
        Self { settings }
    }

    fn encode(&self, payload: &str) -> Result<QrCode> {
        let level = match self.settings.error_correction {
            ErrorCorrection::L => EcLevel::L,
            ErrorCorrection::M => EcLevel::M,
            ErrorCorrection::Q => EcLevel::Q,
            ErrorCorrection::H => EcLevel::H,
        };
        QrCode::with_error_correction_level(payload.as_bytes(), level).map_err(|e| match e {
            QrError::DataTooLong => {
                Error::InvalidInput("Payload is too long for a QR code".to_string())
            }
            other => Error::Internal(format!("QR encoding failed: {}", other)),
        })
    }

    /// Render the payload into a grayscale image
    pub fn render_image(&self, payload: &str) -> Result<GrayImage> {
        let code = self.encode(payload)?;
        let modules = code.width() as u32;
        let colors = code.to_colors();
        let scale = self.settings.module_size;
        let border = self.settings.border;
        let side = border
            .checked_mul(2)
            .and_then(|quiet| quiet.checked_add(modules))
            .and_then(|span| span.checked_mul(scale))
            .ok_or_else(|| {
                Error::Config(format!(
                    "QR image too large: module_size {} with border {}",
                    scale, border
                ))
            })?;

        let image = GrayImage::from_fn(side, side, |x, y| {
            let mx = (x / scale).checked_sub(border);
            let my = (y / scale).checked_sub(border);
            match (mx, my) {
                (Some(mx), Some(my)) if mx < modules && my < modules => {
                    match colors[(my * modules + mx) as usize] {
                        Color::Dark => DARK,
                        Color::Light => LIGHT,
                    }
                }
                _ => LIGHT,
            }
        });

        debug!("Rendered QR code: {} modules, {}px", modules, side);
        Ok(image)
    }

    /// Render the payload as PNG bytes
    pub fn render_png(&self, payload: &str) -> Result<Vec<u8>> {
        let image = self.render_image(payload)?;
        let mut bytes = Vec::new();
        DynamicImage::ImageLuma8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| Error::Internal(format!("PNG encoding failed: {}", e)))?;
        Ok(bytes)
    }
}

/// Wrap PNG bytes in a `data:` URI
pub fn data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

/// Write PNG bytes to `dir/file_name`, creating `dir` if needed
pub async fn write_png(png: &[u8], dir: &Path, file_name: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, png).await?;
    debug!("Saved QR image: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn emitter() -> QrEmitter {
        QrEmitter::new(QrSettings::default())
    }

    #[test]
    fn test_image_size_includes_border() {
        // Short payloads fit a version 1 code at level L (21 modules)
        let image = emitter().render_image("ID: 1").unwrap();
        assert_eq!(image.width(), (21 + 2 * 4) * 10);
        assert_eq!(image.height(), image.width());
    }

    #[test]
    fn test_border_is_light_and_finder_is_dark() {
        let image = emitter().render_image("ID: 1").unwrap();
        // Quiet zone
        assert_eq!(*image.get_pixel(0, 0), LIGHT);
        assert_eq!(*image.get_pixel(39, 39), LIGHT);
        // Top-left finder pattern starts right after the border
        assert_eq!(*image.get_pixel(40, 40), DARK);
    }

    #[test]
    fn test_custom_settings() {
        let emitter = QrEmitter::new(QrSettings {
            error_correction: ErrorCorrection::H,
            module_size: 2,
            border: 0,
        });
        let image = emitter.render_image("ID: 1").unwrap();
        assert_eq!(image.width(), 21 * 2);
        assert_eq!(*image.get_pixel(0, 0), DARK);
    }

    #[test]
    fn test_oversize_settings_fail_instead_of_overflowing() {
        let emitter = QrEmitter::new(QrSettings {
            error_correction: ErrorCorrection::L,
            module_size: u32::MAX,
            border: 4,
        });
        let err = emitter.render_image("ID: 1").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let emitter = QrEmitter::new(QrSettings {
            error_correction: ErrorCorrection::L,
            module_size: 1,
            border: u32::MAX,
        });
        assert!(matches!(emitter.render_image("ID: 1"), Err(Error::Config(_))));
    }

    #[test]
    fn test_render_png_has_magic() {
        let png = emitter().render_png("ID: 42\nName: Ann").unwrap();
        assert!(png.starts_with(PNG_MAGIC));
    }

    #[test]
    fn test_data_uri_prefix() {
        let uri = data_uri(&emitter().render_png("hello").unwrap());
        let encoded = uri.strip_prefix("data:image/png;base64,").unwrap();
        let decoded = STANDARD.decode(encoded).unwrap();
        assert!(decoded.starts_with(PNG_MAGIC));
    }

    #[test]
    fn test_payload_too_long() {
        let payload = "x".repeat(8000);
        let err = emitter().render_png(&payload).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_write_png_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("static");
        let png = emitter().render_png("hello").unwrap();
        let path = write_png(&png, &target, "qrcode.png").await.unwrap();
        assert_eq!(path, target.join("qrcode.png"));
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(PNG_MAGIC));
    }
}
