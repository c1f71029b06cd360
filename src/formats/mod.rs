pub mod jpeg;
pub mod webp;

use image::{DynamicImage, ImageFormat, ImageReader};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io::{Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{OverlayError, Result};

/// Extensions the scanner picks up, compared case-insensitively
pub const SUPPORTED_EXTENSIONS: [&str; 7] = ["bmp", "ico", "jpeg", "jpg", "png", "tiff", "webp"];

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EncodeOptions {
    pub jpeg_quality: u8,
    pub webp_quality: f32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: 85,
            webp_quality: 85.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace whatever is at the destination
    Overwrite,
    /// Leave an existing destination alone
    CreateNew,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Saved {
    Written,
    AlreadyExists,
}

/// Decode an image, trusting its contents over its extension
pub fn load(path: &Path) -> Result<DynamicImage> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    debug!("Opening image file: {:?}, detected format: {:?}", path, reader.format());
    Ok(reader.decode()?)
}

/// Encode an image in the format named by `path`'s extension
pub fn encode_for_path(image: &DynamicImage, path: &Path, options: &EncodeOptions) -> Result<Vec<u8>> {
    match ImageFormat::from_path(path)? {
        ImageFormat::Jpeg => jpeg::encode(image, options.jpeg_quality),
        ImageFormat::WebP => webp::encode(image, options.webp_quality),
        format => {
            let mut buffer = Cursor::new(Vec::new());
            image.write_to(&mut buffer, format)?;
            Ok(buffer.into_inner())
        }
    }
}

/// Write an image to `destination` without ever exposing a partially
/// written file.
///
/// The encoded bytes go to a temporary file in the destination directory,
/// which is then renamed into place. The output takes the permissions of
/// `permissions_from` when that file exists.
pub fn save_atomic(
    image: &DynamicImage,
    destination: &Path,
    permissions_from: &Path,
    mode: WriteMode,
    options: &EncodeOptions,
) -> Result<Saved> {
    let bytes = encode_for_path(image, destination, options)?;

    let directory = destination
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(directory)?;
    temp.write_all(&bytes)?;
    temp.as_file().sync_all()?;

    if let Ok(metadata) = std::fs::metadata(permissions_from) {
        std::fs::set_permissions(temp.path(), metadata.permissions())?;
    }

    match mode {
        WriteMode::Overwrite => {
            temp.persist(destination)?;
        }
        WriteMode::CreateNew => match temp.persist_noclobber(destination) {
            Ok(_) => {}
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                debug!("{:?} appeared while encoding, leaving it alone", destination);
                return Ok(Saved::AlreadyExists);
            }
            Err(e) => return Err(e.into()),
        },
    }

    debug!("Wrote {} bytes to {:?}", bytes.len(), destination);
    Ok(Saved::Written)
}

/// Sibling path for a non-in-place output: `<dir>/<prefix><stem>.<ext>`
pub fn output_path(source: &Path, prefix: &str) -> Result<PathBuf> {
    let stem = source.file_stem().ok_or_else(|| {
        OverlayError::Io(std::io::Error::new(
            ErrorKind::InvalidInput,
            format!("{} has no file name", source.display()),
        ))
    })?;

    let mut name = OsString::from(prefix);
    name.push(stem);
    if let Some(extension) = source.extension() {
        name.push(".");
        name.push(extension);
    }
    Ok(source.with_file_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageBuffer, Rgb, Rgba};
    use tempfile::TempDir;

    fn test_image() -> DynamicImage {
        DynamicImage::ImageRgba8(ImageBuffer::from_pixel(32, 24, Rgba([200, 100, 50, 255])))
    }

    #[test]
    fn test_is_supported() {
        for name in ["a.png", "b.JPG", "c.jpeg", "d.Tiff", "e.webp", "f.bmp", "g.ico"] {
            assert!(is_supported(Path::new(name)), "{name}");
        }
        for name in ["a.gif", "b.pngx", "c", "d.tif", "notes.txt", ".png"] {
            assert!(!is_supported(Path::new(name)), "{name}");
        }
    }

    #[test]
    fn test_output_path() {
        assert_eq!(
            output_path(Path::new("/photos/beach.JPG"), "o_").unwrap(),
            PathBuf::from("/photos/o_beach.JPG")
        );
        assert_eq!(
            output_path(Path::new("dir/archive.tar.png"), "o_").unwrap(),
            PathBuf::from("dir/o_archive.tar.png")
        );
        assert!(output_path(Path::new("/"), "o_").is_err());
    }

    #[test]
    fn test_save_atomic_png() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.png");

        let saved = save_atomic(
            &test_image(),
            &path,
            &path,
            WriteMode::CreateNew,
            &EncodeOptions::default(),
        )
        .unwrap();
        assert_eq!(saved, Saved::Written);

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.dimensions(), (32, 24));
        assert_eq!(loaded.get_pixel(3, 3), Rgba([200, 100, 50, 255]));

        // No temporary files left behind
        let entries = std::fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_create_new_leaves_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("taken.png");
        std::fs::write(&path, b"not an image").unwrap();

        let saved = save_atomic(
            &test_image(),
            &path,
            &path,
            WriteMode::CreateNew,
            &EncodeOptions::default(),
        )
        .unwrap();
        assert_eq!(saved, Saved::AlreadyExists);
        assert_eq!(std::fs::read(&path).unwrap(), b"not an image");
    }

    #[test]
    fn test_overwrite_replaces_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("replace.bmp");
        std::fs::write(&path, b"old").unwrap();

        let saved = save_atomic(
            &test_image(),
            &path,
            &path,
            WriteMode::Overwrite,
            &EncodeOptions::default(),
        )
        .unwrap();
        assert_eq!(saved, Saved::Written);
        assert_eq!(load(&path).unwrap().dimensions(), (32, 24));
    }

    #[test]
    fn test_jpeg_and_webp_encode_by_extension() {
        let temp_dir = TempDir::new().unwrap();
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(16, 16, Rgb([10, 200, 10])));
        let options = EncodeOptions {
            jpeg_quality: 90,
            webp_quality: 75.0,
        };

        for name in ["photo.jpg", "photo.webp"] {
            let path = temp_dir.path().join(name);
            save_atomic(&image, &path, &path, WriteMode::CreateNew, &options).unwrap();
            let loaded = load(&path).unwrap();
            assert_eq!(loaded.dimensions(), (16, 16), "{name}");
        }

        let jpeg = std::fs::read(temp_dir.path().join("photo.jpg")).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let webp = std::fs::read(temp_dir.path().join("photo.webp")).unwrap();
        assert_eq!(&webp[8..12], b"WEBP");
    }

    #[test]
    fn test_unknown_extension_is_error() {
        let result = encode_for_path(
            &test_image(),
            Path::new("output.unknown"),
            &EncodeOptions::default(),
        );
        assert!(matches!(result, Err(OverlayError::Image(_))));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = load(&temp_dir.path().join("missing.png"));
        assert!(matches!(result, Err(OverlayError::Io(_))));
    }
}
