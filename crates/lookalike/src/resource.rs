//! Owned image artifacts.
//!
//! An [`ImageResource`] is a decoded image plus the [`FormatHint`] of the bytes
//! it came from. Each holder owns its pixels outright: handing an artifact to a
//! second owner goes through [`ImageResource::duplicate`], so releasing one
//! copy never invalidates another.

use crate::result::{LookalikeError, LookalikeResult};
use image::{DynamicImage, GenericImageView, ImageFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Encoding an artifact was decoded from, or should be written as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatHint {
    /// Portable Network Graphics
    Png,
    /// JPEG
    Jpeg,
    /// Graphics Interchange Format
    Gif,
    /// Anything else; written as JPEG
    #[default]
    Unknown,
}

impl FormatHint {
    /// Detect the hint from encoded bytes
    #[must_use]
    pub fn detect(bytes: &[u8]) -> Self {
        image::guess_format(bytes).map_or(Self::Unknown, Self::from_image_format)
    }

    /// Map a decoder format onto a hint
    #[must_use]
    pub const fn from_image_format(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Png => Self::Png,
            ImageFormat::Jpeg => Self::Jpeg,
            ImageFormat::Gif => Self::Gif,
            _ => Self::Unknown,
        }
    }

    /// File extension used for persisted artifacts
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Jpeg | Self::Unknown => "jpg",
        }
    }

    /// Encoder used when persisting an artifact with this hint
    #[must_use]
    pub const fn encoder_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Gif => ImageFormat::Gif,
            Self::Jpeg | Self::Unknown => ImageFormat::Jpeg,
        }
    }
}

/// A decoded image owned by exactly one holder
#[derive(Debug)]
pub struct ImageResource {
    image: DynamicImage,
    format_hint: FormatHint,
}

impl ImageResource {
    /// Wrap an already decoded image
    #[must_use]
    pub const fn new(image: DynamicImage, format_hint: FormatHint) -> Self {
        Self { image, format_hint }
    }

    /// Decode encoded bytes, remembering their format
    ///
    /// # Errors
    ///
    /// Returns [`LookalikeError::MalformedImage`] if the bytes are not a
    /// supported image
    pub fn decode(locator: &str, bytes: &[u8]) -> LookalikeResult<Self> {
        let format_hint = FormatHint::detect(bytes);
        let image = image::load_from_memory(bytes)
            .map_err(|e| LookalikeError::malformed_image(locator, e.to_string()))?;
        Ok(Self { image, format_hint })
    }

    /// Deep copy with an independent lifetime
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            image: self.image.clone(),
            format_hint: self.format_hint,
        }
    }

    /// Borrow the decoded pixels
    #[must_use]
    pub const fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Format the artifact was decoded from
    #[must_use]
    pub const fn format_hint(&self) -> FormatHint {
        self.format_hint
    }

    /// Width and height in pixels
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Encode with the encoder selected by the format hint
    ///
    /// # Errors
    ///
    /// Returns [`LookalikeError::Persistence`] if encoding fails
    pub fn encode(&self) -> LookalikeResult<Vec<u8>> {
        let format = self.format_hint.encoder_format();
        let mut buffer = Cursor::new(Vec::new());
        let written = match format {
            // JPEG has no alpha channel
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(self.image.to_rgb8())
                .write_to(&mut buffer, format),
            ImageFormat::Gif => {
                DynamicImage::ImageRgba8(self.image.to_rgba8()).write_to(&mut buffer, format)
            }
            _ => self.image.write_to(&mut buffer, format),
        };
        written.map_err(|e| {
            LookalikeError::persistence(
                format!("<{} buffer>", self.format_hint.extension()),
                e.to_string(),
            )
        })?;
        Ok(buffer.into_inner())
    }

    /// Free the pixels
    pub fn release(self) {
        drop(self);
    }
}
