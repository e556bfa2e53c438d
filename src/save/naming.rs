//! File and folder naming schemes

use super::mime;
use crate::media::{Track, TrackSet};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Characters allowed in generated names; everything else becomes `-`
// The pattern is a literal and always compiles
#[allow(clippy::expect_used)]
static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^0-9a-zA-Z_ :!,\[\]().'-]").expect("valid file name pattern")
});

const UNKNOWN_ARTIST: &str = "Unknown Artist";
const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Derives where an item of type `T` is written below a root folder
pub trait NamingScheme<T>: Send + Sync {
    /// Destination of `item` below `root`
    fn name_of(&self, root: &Path, item: &T) -> PathBuf;
}

/// Replace every character outside a conservative set with `-`
///
/// ```
/// use media_dl::save::naming::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("AC/DC: Live?"), "AC-DC: Live-");
/// ```
pub fn sanitize_file_name(name: &str) -> String {
    UNSAFE_CHARS.replace_all(name, "-").into_owned()
}

/// `NN - title.ext` inside an album, `artist - title.ext` otherwise
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultTrackNaming;

impl NamingScheme<Track> for DefaultTrackNaming {
    fn name_of(&self, root: &Path, track: &Track) -> PathBuf {
        let mime_type = track.mime_type();
        let extension = mime::extension_for(mime_type.as_deref().unwrap_or("audio/mpeg"))
            .unwrap_or("bin");
        let prefix = match (track.album(), track.artist()) {
            (Some(_), _) => format!("{:02} - ", track.index()),
            (None, Some(artist)) => format!("{artist} - "),
            (None, None) => String::new(),
        };
        let name = sanitize_file_name(&format!("{prefix}{}", track.title()));
        root.join(format!("{name}.{extension}"))
    }
}

/// `<root>/<artist>`
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultLooseSetNaming;

impl NamingScheme<TrackSet> for DefaultLooseSetNaming {
    fn name_of(&self, root: &Path, set: &TrackSet) -> PathBuf {
        root.join(sanitize_file_name(set.artist().unwrap_or(UNKNOWN_ARTIST)))
    }
}

/// `<root>/<artist>/<album title>`
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultAlbumNaming;

impl NamingScheme<TrackSet> for DefaultAlbumNaming {
    fn name_of(&self, root: &Path, album: &TrackSet) -> PathBuf {
        root.join(sanitize_file_name(album.artist().unwrap_or(UNKNOWN_ARTIST)))
            .join(sanitize_file_name(album.title().unwrap_or(UNKNOWN_ALBUM)))
    }
}
