//! MIME type to file extension lookup

/// Known MIME types and their preferred extension
const EXTENSIONS: &[(&str, &str)] = &[
    ("audio/mpeg", "mp3"),
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
];

/// Extensions mapping back to a MIME type
const MIME_TYPES: &[(&str, &str)] = &[
    ("mp3", "audio/mpeg"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("jpe", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
];

/// File extension for a MIME type, ignoring parameters and case
///
/// ```
/// use media_dl::save::mime::extension_for;
///
/// assert_eq!(extension_for("Audio/MPEG"), Some("mp3"));
/// assert_eq!(extension_for("image/jpeg; charset=binary"), Some("jpg"));
/// assert_eq!(extension_for("video/mp4"), None);
/// ```
pub fn extension_for(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    EXTENSIONS
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(essence))
        .map(|(_, ext)| *ext)
}

/// MIME type for a file extension, ignoring case and a leading dot
pub fn mime_type_for(extension: &str) -> Option<&'static str> {
    let extension = extension.trim().trim_start_matches('.');
    MIME_TYPES
        .iter()
        .find(|(ext, _)| ext.eq_ignore_ascii_case(extension))
        .map(|(_, mime)| *mime)
}
