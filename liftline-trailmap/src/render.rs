//! PDF rasterisation and image cropping.

use std::io::Cursor;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use image::ImageFormat;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use liftline_core::{DocumentRenderer, LiftlineError, Result, TrailMapPayload};

/// Renders PDF pages with poppler's `pdftoppm`.
#[derive(Clone, Debug)]
pub struct PopplerRenderer {
    binary: PathBuf,
}

impl Default for PopplerRenderer {
    fn default() -> Self {
        Self::new("pdftoppm")
    }
}

impl PopplerRenderer {
    /// Creates a renderer using `binary` (a name on `PATH` or a full path).
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }
}

#[async_trait]
impl DocumentRenderer for PopplerRenderer {
    #[instrument(skip(self, document), fields(bytes = document.len()))]
    async fn render(&self, document: Bytes, page: u32, dpi: u32) -> Result<TrailMapPayload> {
        if page == 0 || dpi == 0 {
            return Err(LiftlineError::ConversionFailed(format!(
                "invalid page {} / dpi {}",
                page, dpi
            )));
        }

        let scratch = tempfile::tempdir()?;
        let input = scratch.path().join("map.pdf");
        let prefix = scratch.path().join("map");
        tokio::fs::write(&input, &document).await?;

        let page_arg = page.to_string();
        let output = Command::new(&self.binary)
            .arg("-f")
            .arg(&page_arg)
            .arg("-l")
            .arg(&page_arg)
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-png")
            .arg("-singlefile")
            .arg(&input)
            .arg(&prefix)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| LiftlineError::ConversionFailed(format!("{}: {}", self.binary.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LiftlineError::ConversionFailed(format!(
                "pdftoppm exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let png = tokio::fs::read(prefix.with_extension("png"))
            .await
            .map_err(|e| LiftlineError::ConversionFailed(format!("no rendered page: {}", e)))?;
        debug!(page, dpi, bytes = png.len(), "Rendered PDF page");
        Ok(TrailMapPayload::new(png, "image/png"))
    }
}

/// Keeps the top `percent`% of an image. JPEG stays JPEG, anything else
/// comes back as PNG.
///
/// An image that cannot be decoded is served uncropped.
pub fn crop_top(payload: &TrailMapPayload, percent: u8) -> Result<TrailMapPayload> {
    if percent == 0 || percent > 100 {
        return Err(LiftlineError::ConversionFailed(format!("crop of {}%", percent)));
    }
    if percent == 100 {
        return Ok(payload.clone());
    }

    let decoded = image::guess_format(&payload.bytes).and_then(|format| {
        image::load_from_memory_with_format(&payload.bytes, format).map(|img| (format, img))
    });
    let (format, img) = match decoded {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(
                error = %e,
                content_type = %payload.content_type,
                "Cannot decode trail map for cropping, serving it uncropped"
            );
            return Ok(payload.clone());
        }
    };

    let height = ((u64::from(img.height()) * u64::from(percent)) / 100).max(1) as u32;
    let cropped = img.crop_imm(0, 0, img.width(), height);

    let out_format = match format {
        ImageFormat::Jpeg => ImageFormat::Jpeg,
        _ => ImageFormat::Png,
    };
    let mut buf = Cursor::new(Vec::new());
    cropped
        .write_to(&mut buf, out_format)
        .map_err(|e| LiftlineError::ConversionFailed(format!("encode: {}", e)))?;

    debug!(
        from = img.height(),
        to = height,
        format = out_format.to_mime_type(),
        "Cropped trail map"
    );
    Ok(TrailMapPayload::new(buf.into_inner(), out_format.to_mime_type()))
}
