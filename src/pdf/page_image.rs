//! Rendered page images

use crate::error::{Error, Result};
use crate::source::CacheWeight;
use base64::Engine;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;

/// Page rotation in degrees, counter-clockwise positive, multiple of 90
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rotation(i32);

impl Rotation {
    pub const NONE: Rotation = Rotation(0);
    /// Turns a page scanned on its side upright
    pub const CLOCKWISE_90: Rotation = Rotation(-90);

    pub fn new(degrees: i32) -> Result<Self> {
        if degrees % 90 != 0 {
            return Err(Error::InvalidRotation { degrees });
        }
        Ok(Rotation(degrees))
    }

    pub fn degrees(&self) -> i32 {
        self.0
    }

    /// Counter-clockwise quarter turns in `0..4`
    fn quarter_turns(&self) -> i32 {
        (self.0 / 90).rem_euclid(4)
    }

    pub fn is_none(&self) -> bool {
        self.quarter_turns() == 0
    }

    /// Rotate an image, growing the canvas for quarter turns
    pub fn apply(&self, img: DynamicImage) -> DynamicImage {
        // image's rotate90 turns clockwise
        match self.quarter_turns() {
            1 => img.rotate270(),
            2 => img.rotate180(),
            3 => img.rotate90(),
            _ => img,
        }
    }
}

impl FromStr for Rotation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let degrees: i32 = s.trim().parse().map_err(|_| Error::InvalidInput {
            reason: format!("rotation must be an integer number of degrees, got '{s}'"),
        })?;
        Rotation::new(degrees)
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A page rendered and encoded as RGB JPEG
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl PageImage {
    /// Encode an image as JPEG, dropping any alpha channel
    pub fn from_image(img: &DynamicImage) -> Result<Self> {
        let (width, height) = img.dimensions();
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

        let mut jpeg = Vec::new();
        rgb.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)?;

        Ok(Self {
            jpeg,
            width,
            height,
        })
    }

    /// Decode back into pixels (used for OCR input and rotation of cached renders)
    pub fn decode(&self) -> Result<DynamicImage> {
        Ok(image::load_from_memory_with_format(
            &self.jpeg,
            ImageFormat::Jpeg,
        )?)
    }

    pub fn rotated(&self, rotation: Rotation) -> Result<Self> {
        if rotation.is_none() {
            return Ok(self.clone());
        }
        Self::from_image(&rotation.apply(self.decode()?))
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.jpeg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.jpeg)?;
        Ok(())
    }
}

impl CacheWeight for PageImage {
    fn weight(&self) -> usize {
        self.jpeg.len()
    }
}
