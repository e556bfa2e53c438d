//! ID3 tagging of saved MPEG audio
//!
//! Frames already present in a downloaded file win: only frames the file
//! does not carry yet are filled in.

use super::mime;
use crate::error::{Error, Result};
use crate::types::TransferOutcome;
use id3::frame::{Picture, PictureType};
use id3::{ErrorKind, Tag, TagLike, Version};
use std::path::Path;

/// Cover art MIME type assumed when the server did not declare one
const DEFAULT_COVER_MIME: &str = "image/jpeg";

/// Metadata written into a track file
#[derive(Clone, Debug, Default)]
pub struct TrackTags {
    /// Track title (TIT2)
    pub title: Option<String>,
    /// Track artist (TPE1)
    pub artist: Option<String>,
    /// Album title (TALB)
    pub album: Option<String>,
    /// Album artist (TPE2)
    pub album_artist: Option<String>,
    /// Position within the album (TRCK)
    pub track: Option<u32>,
    /// Release year (TYER)
    pub year: Option<i32>,
    /// Front cover (APIC)
    pub cover: Option<TransferOutcome>,
}

/// Whether content of this type carries ID3 tags
///
/// Undeclared content is taken for MPEG audio, as file naming does.
///
/// ```
/// use media_dl::save::tags::is_taggable;
///
/// assert!(is_taggable(Some("audio/mpeg")));
/// assert!(is_taggable(None));
/// assert!(!is_taggable(Some("video/mp4")));
/// ```
pub fn is_taggable(content_type: Option<&str>) -> bool {
    content_type.is_none_or(|content_type| mime::extension_for(content_type) == Some("mp3"))
}

/// Fill the frames of the file at `path` that are still missing
///
/// Returns whether the file was rewritten. Blocking; run it off the async
/// workers.
pub fn apply(path: &Path, tags: &TrackTags) -> Result<bool> {
    let mut tag = match Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(e) if matches!(e.kind, ErrorKind::NoTag) => Tag::new(),
        Err(e) => {
            tracing::debug!(path = ?path, error = %e, "existing tag unreadable, starting a fresh one");
            Tag::new()
        }
    };

    if !fill_missing(&mut tag, tags) {
        return Ok(false);
    }
    tag.write_to_path(path, Version::Id3v23)
        .map_err(|e| Error::Save {
            path: path.to_path_buf(),
            reason: format!("unable to write tags: {e}"),
        })?;
    Ok(true)
}

fn fill_missing(tag: &mut Tag, tags: &TrackTags) -> bool {
    let mut changed = false;

    if tag.title().is_none()
        && let Some(title) = &tags.title
    {
        tag.set_title(title.as_str());
        changed = true;
    }
    if tag.artist().is_none()
        && let Some(artist) = &tags.artist
    {
        tag.set_artist(artist.as_str());
        changed = true;
    }
    if tag.album().is_none()
        && let Some(album) = &tags.album
    {
        tag.set_album(album.as_str());
        changed = true;
    }
    if tag.album_artist().is_none()
        && let Some(album_artist) = &tags.album_artist
    {
        tag.set_album_artist(album_artist.as_str());
        changed = true;
    }
    if tag.track().is_none()
        && let Some(track) = tags.track
    {
        tag.set_track(track);
        changed = true;
    }
    if tag.year().is_none()
        && let Some(year) = tags.year
    {
        tag.set_year(year);
        changed = true;
    }
    if tag.pictures().next().is_none()
        && let Some(cover) = &tags.cover
    {
        tag.add_frame(Picture {
            mime_type: cover
                .content_type()
                .unwrap_or(DEFAULT_COVER_MIME)
                .to_string(),
            picture_type: PictureType::CoverFront,
            description: String::new(),
            data: cover.payload().to_vec(),
        });
        changed = true;
    }

    changed
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn full_tags() -> TrackTags {
        TrackTags {
            title: Some("Anthem".to_string()),
            artist: Some("Band".to_string()),
            album: Some("Debut".to_string()),
            album_artist: Some("Band".to_string()),
            track: Some(2),
            year: Some(2009),
            cover: Some(TransferOutcome::new(
                Some("image/png".to_string()),
                &b"png bytes"[..],
            )),
        }
    }

    #[test]
    fn untagged_file_gets_every_frame() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("song.mp3");
        std::fs::write(&path, b"mpeg frames").unwrap();

        assert!(apply(&path, &full_tags()).unwrap());

        let tag = Tag::read_from_path(&path).unwrap();
        assert_eq!(tag.title(), Some("Anthem"));
        assert_eq!(tag.artist(), Some("Band"));
        assert_eq!(tag.album(), Some("Debut"));
        assert_eq!(tag.album_artist(), Some("Band"));
        assert_eq!(tag.track(), Some(2));
        assert_eq!(tag.year(), Some(2009));
        let cover = tag.pictures().next().unwrap();
        assert_eq!(cover.mime_type, "image/png");
        assert_eq!(cover.picture_type, PictureType::CoverFront);
        assert_eq!(cover.data, b"png bytes");

        // The audio itself follows the tag untouched
        assert!(std::fs::read(&path).unwrap().ends_with(b"mpeg frames"));
    }

    #[test]
    fn existing_frames_are_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("song.mp3");
        std::fs::write(&path, b"mpeg frames").unwrap();
        let mut existing = Tag::new();
        existing.set_title("Original Title");
        existing.set_year(1999);
        existing.write_to_path(&path, Version::Id3v23).unwrap();

        assert!(apply(&path, &full_tags()).unwrap());

        let tag = Tag::read_from_path(&path).unwrap();
        assert_eq!(tag.title(), Some("Original Title"));
        assert_eq!(tag.year(), Some(1999));
        assert_eq!(tag.album(), Some("Debut"), "missing frames are still filled");
    }

    #[test]
    fn nothing_to_fill_leaves_file_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("song.mp3");
        std::fs::write(&path, b"mpeg frames").unwrap();

        assert!(!apply(&path, &TrackTags::default()).unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), b"mpeg frames");
    }

    #[test]
    fn only_mpeg_audio_is_taggable() {
        assert!(is_taggable(Some("audio/mpeg; charset=binary")));
        assert!(!is_taggable(Some("image/jpeg")));
    }
}
