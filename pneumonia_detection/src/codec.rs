use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, ImageReader};
use std::io::Cursor;
use thiserror::Error;

const DATA_URI_PREFIX: &str = "data:image";

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("data URI has no payload separator")]
    MalformedDataUri,
    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("io error while reading image: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the bytes of an image to classify come from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Raw file content from a multipart upload.
    Upload(Vec<u8>),
    /// Base64 text, optionally carrying a `data:image/...;base64,` header.
    Base64(String),
}

/// Returns the base64 payload with any `data:image...,` header removed.
pub fn strip_data_uri(encoded: &str) -> Result<&str, CodecError> {
    if encoded.starts_with(DATA_URI_PREFIX) {
        return encoded
            .split_once(',')
            .map(|(_, payload)| payload)
            .ok_or(CodecError::MalformedDataUri);
    }
    Ok(encoded)
}

pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, CodecError> {
    let payload = strip_data_uri(encoded.trim())?;
    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(general_purpose::STANDARD.decode(payload)?)
}

pub fn encode_base64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Decodes an encoded image, guessing the format from its content.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, CodecError> {
    let image_reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    Ok(image_reader.decode()?)
}

pub fn allowed_file(filename: &str, allowed_extensions: &[String]) -> bool {
    match filename.rsplit_once('.') {
        Some((_, extension)) => {
            let extension = extension.to_lowercase();
            allowed_extensions.iter().any(|allowed| *allowed == extension)
        }
        None => false,
    }
}

/// Reduces a client supplied filename to a safe ASCII basename.
pub fn secure_filename(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .filter(|c| c.is_ascii())
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");

    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb};

    fn png_bytes() -> Vec<u8> {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(8, 8, Rgb([10, 200, 30]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn allowed() -> Vec<String> {
        vec!["png".into(), "jpg".into(), "jpeg".into()]
    }

    #[test]
    fn test_data_uri_prefix_is_ignored() {
        let bytes = png_bytes();
        let plain = encode_base64(&bytes);
        let prefixed = format!("data:image/png;base64,{}", plain);

        let from_plain = decode_base64(&plain).unwrap();
        let from_prefixed = decode_base64(&prefixed).unwrap();

        assert_eq!(from_plain, bytes);
        assert_eq!(from_prefixed, from_plain);
    }

    #[test]
    fn test_data_uri_without_separator_is_rejected() {
        assert!(matches!(
            decode_base64("data:image/png;base64"),
            Err(CodecError::MalformedDataUri)
        ));
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        assert!(matches!(
            decode_base64("not base64 at all!!"),
            Err(CodecError::Base64(_))
        ));
    }

    #[test]
    fn test_decode_image_guesses_format() {
        let img = decode_image(&png_bytes()).unwrap();
        assert_eq!(img.width(), 8);
        assert_eq!(img.height(), 8);
        assert!(decode_image(b"definitely not an image").is_err());
    }

    #[test]
    fn test_allowed_file() {
        assert!(allowed_file("scan.png", &allowed()));
        assert!(allowed_file("chest.XRAY.JPEG", &allowed()));
        assert!(allowed_file("a.jpg", &allowed()));
        assert!(!allowed_file("scan.gif", &allowed()));
        assert!(!allowed_file("png", &allowed()));
        assert!(!allowed_file("scan.", &allowed()));
    }

    #[test]
    fn test_secure_filename() {
        assert_eq!(secure_filename("My cool scan.png"), "My_cool_scan.png");
        assert_eq!(secure_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("röntgen.jpg"), "rntgen.jpg");
        assert_eq!(secure_filename("__init__.png"), "init__.png");
    }
}
