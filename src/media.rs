//! Media containers the service knows how to pull audio out of.

use url::Url;

/// Supported source formats, by format name. Each maps to the `.{name}` extension.
pub const SUPPORTED_FORMATS: [&str; 8] = ["mp4", "m4v", "avi", "mov", "mkv", "webm", "wmv", "3gp"];

pub fn is_supported_format(format: &str) -> bool {
    let format = format.to_lowercase();
    SUPPORTED_FORMATS.contains(&format.as_str())
}

/// Accepts an extension with its leading dot, e.g. `.mp4`.
pub fn is_supported_extension(extension: &str) -> bool {
    extension
        .strip_prefix('.')
        .is_some_and(|format| !format.contains('.') && is_supported_format(format))
}

/// Whether an object key or file name looks like a supported media file.
pub fn is_media_file(key: &str) -> bool {
    key.rsplit_once('.')
        .is_some_and(|(_, extension)| !extension.contains('/') && is_supported_format(extension))
}

/// The file name at the end of a URL path, if any.
pub fn file_name(url: &Url) -> Option<&str> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
}
