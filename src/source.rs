//! Holder for the decoded original image.
//!
//! The pixels live behind an `Arc` so an in-flight rescale keeps the old
//! image alive after a new open replaces it.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;
use tracing::debug;

use crate::error::OpenError;

/// Immutable decoded original.
#[derive(Debug)]
pub struct SourceImage {
    path: PathBuf,
    pixels: RgbaImage,
}

impl SourceImage {
    pub fn new(path: PathBuf, pixels: RgbaImage) -> Self {
        Self { path, pixels }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

/// Current image of the viewer. Only the interactive thread touches it.
#[derive(Debug, Default)]
pub struct SourceImageHolder {
    current: Option<Arc<SourceImage>>,
}

impl SourceImageHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the current image, if any.
    pub fn current(&self) -> Option<Arc<SourceImage>> {
        self.current.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.current.is_some()
    }

    /// Drop the holder's reference. Tasks still holding the image keep it alive.
    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn install(&mut self, image: Arc<SourceImage>) {
        self.current = Some(image);
    }
}

/// `extensions` are lowercase, without the leading dot.
pub fn is_supported(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| extensions.iter().any(|known| *known == ext))
}

/// Check the extension, then decode `path` to an upright RGBA8 image.
pub fn load_source(path: &Path, extensions: &[String]) -> Result<SourceImage, OpenError> {
    if !is_supported(path, extensions) {
        return Err(OpenError::UnsupportedFormat(path.to_path_buf()));
    }
    let pixels = decode_rgba8_apply_exif(path)?;
    Ok(SourceImage::new(path.to_path_buf(), pixels))
}

// Decodes to RGBA8 and applies EXIF orientation when present. Missing or
// unreadable metadata keeps the stored orientation.
fn decode_rgba8_apply_exif(path: &Path) -> Result<RgbaImage, OpenError> {
    let io_err = |source| OpenError::Io {
        path: path.to_path_buf(),
        source,
    };
    let decode_err = |source| OpenError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let img = image::ImageReader::open(path)
        .map_err(io_err)?
        .with_guessed_format()
        .map_err(io_err)?
        .decode()
        .map_err(decode_err)?;

    let img = img.to_rgba8();
    let orientation = read_orientation(path).unwrap_or(1);
    Ok(apply_orientation(img, orientation))
}

fn apply_orientation(img: RgbaImage, orientation: u16) -> RgbaImage {
    use image::imageops::{flip_horizontal, flip_vertical, rotate90, rotate180, rotate270};

    match orientation {
        2 => flip_horizontal(&img),
        3 => rotate180(&img),
        4 => flip_vertical(&img),
        // transpose
        5 => flip_horizontal(&rotate90(&img)),
        6 => rotate90(&img),
        // transverse
        7 => flip_horizontal(&rotate270(&img)),
        8 => rotate270(&img),
        _ => img,
    }
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let orientation = field.value.get_uint(0)? as u16;
    debug!(orientation, path = %path.display(), "exif orientation");
    Some(orientation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    fn extensions() -> Vec<String> {
        vec!["png".into(), "jpg".into()]
    }

    // JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded
    const ORIENT6_JPEG: &str = concat!(
        "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
        "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
    );

    #[test]
    fn applies_orientation_six() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(ORIENT6_JPEG)
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orient6.jpg");
        std::fs::write(&path, &bytes).unwrap();

        let image = load_source(&path, &extensions()).unwrap();
        assert_eq!(image.dimensions(), (1, 2));
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let exts = extensions();
        assert!(is_supported(Path::new("/a/B.PNG"), &exts));
        assert!(!is_supported(Path::new("/a/b.txt"), &exts));
        assert!(!is_supported(Path::new("/a/noext"), &exts));
    }

    #[test]
    fn load_errors_are_classified() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.png");
        std::fs::write(&bad, b"not a png").unwrap();
        let exts = extensions();

        let err = load_source(&bad, &exts).unwrap_err();
        assert!(matches!(err, OpenError::Decode { .. }), "{err}");
        let missing = load_source(&dir.path().join("missing.png"), &exts).unwrap_err();
        assert!(matches!(missing, OpenError::Io { .. }));
        let unsupported = load_source(&dir.path().join("notes.txt"), &exts).unwrap_err();
        assert!(matches!(unsupported, OpenError::UnsupportedFormat(_)));
    }

    #[test]
    fn cleared_holder_leaves_shared_handles_valid() {
        let mut holder = SourceImageHolder::new();
        holder.install(Arc::new(SourceImage::new(
            PathBuf::from("/mem/a.png"),
            RgbaImage::new(3, 2),
        )));
        let in_flight = holder.current().unwrap();
        holder.clear();
        assert!(!holder.is_loaded());
        assert_eq!(in_flight.dimensions(), (3, 2));
        assert_eq!(Arc::strong_count(&in_flight), 1);
    }

    #[test]
    fn orientation_table() {
        let img = RgbaImage::new(4, 2);
        assert_eq!(apply_orientation(img.clone(), 1).dimensions(), (4, 2));
        assert_eq!(apply_orientation(img.clone(), 3).dimensions(), (4, 2));
        assert_eq!(apply_orientation(img.clone(), 5).dimensions(), (2, 4));
        assert_eq!(apply_orientation(img.clone(), 8).dimensions(), (2, 4));
        assert_eq!(apply_orientation(img, 42).dimensions(), (4, 2));
    }
}
