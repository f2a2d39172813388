//! Magic-byte content-type detection for the image formats the service
//! commonly serves.

/// Fallback for buffers no signature matches.
const OCTET_STREAM: &str = "application/octet-stream";

/// Detects a content type from leading magic bytes.
///
/// Covers the formats an image origin realistically returns. Anything
/// unrecognized falls back to `application/octet-stream`; an explicit
/// content type or [`Meta`](super::Meta) always wins over this.
pub fn detect_content_type(data: &[u8]) -> &'static str {
    if data.len() < 4 {
        return OCTET_STREAM;
    }
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg";
    }
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return "image/png";
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return "image/gif";
    }
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return "image/webp";
    }
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        match &data[8..12] {
            b"avif" | b"avis" => return "image/avif",
            b"heic" | b"heix" => return "image/heic",
            _ => {}
        }
    }
    if data.starts_with(b"BM") {
        return "image/bmp";
    }
    if data.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]) {
        return "image/tiff";
    }
    OCTET_STREAM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jpeg() {
        assert_eq!(
            detect_content_type(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]),
            "image/jpeg"
        );
    }

    #[test]
    fn test_png() {
        assert_eq!(
            detect_content_type(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00]),
            "image/png"
        );
    }

    #[test]
    fn test_gif() {
        assert_eq!(detect_content_type(b"GIF89a-rest"), "image/gif");
        assert_eq!(detect_content_type(b"GIF87a-rest"), "image/gif");
    }

    #[test]
    fn test_webp() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&[0x24, 0x00, 0x00, 0x00]);
        buf.extend_from_slice(b"WEBP");
        assert_eq!(detect_content_type(&buf), "image/webp");
    }

    #[test]
    fn test_avif() {
        let mut buf = vec![0x00, 0x00, 0x00, 0x1C];
        buf.extend_from_slice(b"ftyp");
        buf.extend_from_slice(b"avif");
        assert_eq!(detect_content_type(&buf), "image/avif");
    }

    #[test]
    fn test_tiff_both_byte_orders() {
        assert_eq!(
            detect_content_type(&[0x49, 0x49, 0x2A, 0x00, 0x08]),
            "image/tiff"
        );
        assert_eq!(
            detect_content_type(&[0x4D, 0x4D, 0x00, 0x2A, 0x08]),
            "image/tiff"
        );
    }

    #[test]
    fn test_unknown_falls_back() {
        assert_eq!(detect_content_type(b"boop"), OCTET_STREAM);
        assert_eq!(detect_content_type(b""), OCTET_STREAM);
        assert_eq!(detect_content_type(&[0xFF]), OCTET_STREAM);
    }
}
