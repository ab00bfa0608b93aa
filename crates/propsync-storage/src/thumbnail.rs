use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::{GenericImageView, ImageFormat};
use serde::{Deserialize, Serialize};

use crate::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSize {
    pub name: &'static str,
    pub max_edge: u32,
}

pub const THUMBNAIL_SIZES: [ThumbnailSize; 3] = [
    ThumbnailSize {
        name: "thumbnail",
        max_edge: 150,
    },
    ThumbnailSize {
        name: "medium",
        max_edge: 300,
    },
    ThumbnailSize {
        name: "large",
        max_edge: 1024,
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailVariant {
    pub file: String,
    pub width: u32,
    pub height: u32,
}

/// Attachment metadata describing the original image and its generated variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailMetadata {
    pub width: u32,
    pub height: u32,
    pub file: PathBuf,
    pub sizes: BTreeMap<String, ThumbnailVariant>,
}

/// Decode `source` and write a PNG next to it for every size smaller than the original.
pub fn generate_thumbnails(source: &Path) -> Result<ThumbnailMetadata, StoreError> {
    let img = image::open(source)?;
    let (width, height) = img.dimensions();
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    let dir = source.parent().unwrap_or_else(|| Path::new("."));

    let mut sizes = BTreeMap::new();
    for size in THUMBNAIL_SIZES {
        if width <= size.max_edge && height <= size.max_edge {
            continue;
        }
        let variant = img.thumbnail(size.max_edge, size.max_edge);
        let (w, h) = variant.dimensions();
        let file = format!("{stem}-{w}x{h}.png");
        variant.save_with_format(dir.join(&file), ImageFormat::Png)?;
        sizes.insert(
            size.name.to_string(),
            ThumbnailVariant {
                file,
                width: w,
                height: h,
            },
        );
    }

    Ok(ThumbnailMetadata {
        width,
        height,
        file: source.to_path_buf(),
        sizes,
    })
}
