//! Extracted pictures: file naming, relative links and legacy format conversion.

use crate::error::{Error, Result};
use crate::types::Image;
use crate::wmf;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Picture formats that most Markdown viewers cannot display.
const LEGACY_FORMATS: &[&str] = &["wmf"];

/// Whether pictures with this extension should be converted before linking.
pub fn is_legacy_format(ext: &str) -> bool {
    LEGACY_FORMATS.contains(&ext.to_ascii_lowercase().as_str())
}

/// Why a picture could not be converted.
#[derive(Debug, Error)]
#[error("cannot convert '{}': {reason}", path.display())]
pub struct ImageConversionError {
    pub path: PathBuf,
    pub reason: String,
}

/// Converts an extracted picture file into a portable raster format.
pub trait ImageConverter {
    /// Convert the file at `source` and return the path of the new file.
    fn convert(&self, source: &Path) -> std::result::Result<PathBuf, ImageConversionError>;
}

/// Writes a PNG next to the source. Metafiles are rasterized; anything else
/// is decoded with the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngConverter;

impl ImageConverter for PngConverter {
    fn convert(&self, source: &Path) -> std::result::Result<PathBuf, ImageConversionError> {
        let target = source.with_extension("png");
        let fail = |reason: String| ImageConversionError {
            path: source.to_path_buf(),
            reason,
        };

        let is_metafile = source
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wmf"));
        let decoded = if is_metafile {
            let data = std::fs::read(source).map_err(|e| fail(e.to_string()))?;
            let raster = wmf::rasterize(&data).map_err(|e| fail(e.to_string()))?;
            image::DynamicImage::ImageRgba8(raster)
        } else {
            image::open(source).map_err(|e| fail(e.to_string()))?
        };

        decoded
            .save_with_format(&target, image::ImageFormat::Png)
            .map_err(|e| fail(e.to_string()))?;
        log::debug!("Converted {} to {}", source.display(), target.display());
        Ok(target)
    }
}

/// Where a picture was written and how the document links to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedImage {
    /// Location on disk.
    pub file: PathBuf,
    /// `/`-separated path used in the output document.
    pub link: String,
}

/// Writes pictures into an image directory and computes their links.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    prefix: String,
    /// Directory links are relative to.
    base: PathBuf,
}

impl ImageStore {
    /// `output_path` is the document being written; links are made relative
    /// to the common ancestor of its directory and `dir`.
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, output_path: &Path) -> Self {
        let dir = dir.into();
        let output_dir = output_path.parent().unwrap_or_else(|| Path::new(""));
        let base = common_ancestor(output_dir, &dir);
        Self {
            dir,
            prefix: prefix.into(),
            base,
        }
    }

    /// File name for the picture with the given index.
    pub fn file_name(&self, index: usize, ext: &str) -> String {
        format!("{}{}.{}", self.prefix, index, ext)
    }

    /// Write a picture to disk. Failures are fatal.
    pub fn save(&self, image: &Image, index: usize) -> Result<SavedImage> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir).map_err(|source| Error::ImageDirectory {
                path: self.dir.clone(),
                source,
            })?;
        }

        let file = self.dir.join(self.file_name(index, &image.ext));
        std::fs::write(&file, &image.blob).map_err(|source| Error::ImageWrite {
            path: file.clone(),
            source,
        })?;

        let link = self.link_for(&file);
        Ok(SavedImage { file, link })
    }

    /// Link for a file inside the image directory.
    pub fn link_for(&self, file: &Path) -> String {
        let relative = file.strip_prefix(&self.base).unwrap_or(file);
        to_link(relative)
    }
}

/// Longest shared leading path of two paths.
fn common_ancestor(a: &Path, b: &Path) -> PathBuf {
    a.components()
        .zip(b.components())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x)
        .collect()
}

fn to_link(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            // Joins to a leading slash.
            Component::RootDir => Some(String::new()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 128, 255, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_common_ancestor() {
        assert_eq!(
            common_ancestor(Path::new("docs/out"), Path::new("docs/img")),
            PathBuf::from("docs")
        );
        assert_eq!(common_ancestor(Path::new(""), Path::new("img")), PathBuf::new());
    }

    #[test]
    fn test_link_relative_to_shared_parent() {
        let store = ImageStore::new("docs/img", "deck", Path::new("docs/deck.md"));
        assert_eq!(store.link_for(Path::new("docs/img/deck0.png")), "img/deck0.png");

        let store = ImageStore::new("img", "deck", Path::new("deck.md"));
        assert_eq!(store.link_for(Path::new("img/deck3.png")), "img/deck3.png");
    }

    #[test]
    fn test_save_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("deck.md");
        let store = ImageStore::new(tmp.path().join("media").join("img"), "deck", &output);
        let image = Image {
            blob: vec![1, 2, 3],
            ext: "jpg".to_string(),
        };

        let saved = store.save(&image, 4).unwrap();
        assert_eq!(saved.link, "media/img/deck4.jpg");
        assert_eq!(std::fs::read(&saved.file).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_save_fails_when_directory_cannot_be_created() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let store = ImageStore::new(blocker.join("img"), "p", &tmp.path().join("out.md"));
        let image = Image {
            blob: vec![0],
            ext: "png".to_string(),
        };
        assert!(matches!(store.save(&image, 0), Err(Error::ImageDirectory { .. })));
    }

    #[test]
    fn test_png_converter() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("pic0.bmp");
        image::load_from_memory(&png_bytes())
            .unwrap()
            .save_with_format(&source, image::ImageFormat::Bmp)
            .unwrap();

        let target = PngConverter.convert(&source).unwrap();
        assert_eq!(target, tmp.path().join("pic0.png"));
        assert!(target.exists());
    }

    #[test]
    fn test_png_converter_rasterizes_wmf() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("pic0.wmf");
        std::fs::write(&source, crate::wmf::tests::metafile((0, 0, 96, 96), 96, &[])).unwrap();

        let target = PngConverter.convert(&source).unwrap();
        assert_eq!(target, tmp.path().join("pic0.png"));
        let png = image::open(&target).unwrap();
        assert_eq!((png.width(), png.height()), (96, 96));
    }

    #[test]
    fn test_png_converter_rejects_corrupt_wmf() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("pic0.wmf");
        std::fs::write(&source, [0xD7, 0xCD, 0xC6, 0x9A, 0, 0]).unwrap();
        let err = PngConverter.convert(&source).unwrap_err();
        assert_eq!(err.path, source);
        assert!(!tmp.path().join("pic0.png").exists());
    }

    #[test]
    fn test_save_fails_when_target_is_a_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("img");
        std::fs::create_dir_all(dir.join("deck0.png")).unwrap();
        let store = ImageStore::new(&dir, "deck", &tmp.path().join("deck.md"));
        let image = Image {
            blob: vec![0],
            ext: "png".to_string(),
        };
        match store.save(&image, 0) {
            Err(Error::ImageWrite { path, .. }) => assert_eq!(path, dir.join("deck0.png")),
            other => panic!("expected an image write error, got {:?}", other),
        }
    }

    #[test]
    fn test_legacy_format() {
        assert!(is_legacy_format("wmf"));
        assert!(is_legacy_format("WMF"));
        assert!(!is_legacy_format("png"));
    }
}
