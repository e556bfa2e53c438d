//! Where and how downloaded items are written
//!
//! - [`SaveOptions`] - root folder, cover art flag and naming schemes
//! - [`naming`] - default naming schemes and file name sanitizing
//! - [`mime`] - MIME type to extension lookup
//! - [`tags`] - ID3 tagging of saved MPEG audio

pub mod mime;
pub mod naming;
pub mod tags;

pub use naming::{
    DefaultAlbumNaming, DefaultLooseSetNaming, DefaultTrackNaming, NamingScheme,
    sanitize_file_name,
};

use crate::config::SaveConfig;
use crate::media::{Track, TrackSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Options for one save operation
#[derive(Clone)]
pub struct SaveOptions {
    root: PathBuf,
    save_cover_art_separately: bool,
    write_tags: bool,
    track_naming: Arc<dyn NamingScheme<Track>>,
    loose_set_naming: Arc<dyn NamingScheme<TrackSet>>,
    album_naming: Arc<dyn NamingScheme<TrackSet>>,
}

impl SaveOptions {
    /// Save below `root` with the default naming schemes
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            save_cover_art_separately: false,
            write_tags: true,
            track_naming: Arc::new(DefaultTrackNaming),
            loose_set_naming: Arc::new(DefaultLooseSetNaming),
            album_naming: Arc::new(DefaultAlbumNaming),
        }
    }

    /// Save below `root` using the configured save settings
    pub fn from_config(root: impl Into<PathBuf>, config: &SaveConfig) -> Self {
        Self::new(root)
            .with_cover_art_separately(config.save_cover_art_separately)
            .with_tags(config.write_tags)
    }

    /// Write album cover art as `cover.<ext>` next to the tracks
    pub fn with_cover_art_separately(mut self, enabled: bool) -> Self {
        self.save_cover_art_separately = enabled;
        self
    }

    /// Fill missing ID3 frames of saved MPEG audio from the track's metadata
    pub fn with_tags(mut self, enabled: bool) -> Self {
        self.write_tags = enabled;
        self
    }

    /// Replace the track naming scheme
    pub fn with_track_naming(mut self, scheme: impl NamingScheme<Track> + 'static) -> Self {
        self.track_naming = Arc::new(scheme);
        self
    }

    /// Replace the naming scheme of loose track sets
    pub fn with_loose_set_naming(mut self, scheme: impl NamingScheme<TrackSet> + 'static) -> Self {
        self.loose_set_naming = Arc::new(scheme);
        self
    }

    /// Replace the album naming scheme
    pub fn with_album_naming(mut self, scheme: impl NamingScheme<TrackSet> + 'static) -> Self {
        self.album_naming = Arc::new(scheme);
        self
    }

    /// Same options below another root
    pub fn copy_with_root(&self, root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..self.clone()
        }
    }

    /// Root folder
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether cover art is written separately
    pub fn save_cover_art_separately(&self) -> bool {
        self.save_cover_art_separately
    }

    /// Whether saved MPEG audio gets tagged
    pub fn write_tags(&self) -> bool {
        self.write_tags
    }

    /// File a track is written to
    pub fn track_path(&self, track: &Track) -> PathBuf {
        self.track_naming.name_of(&self.root, track)
    }

    /// Folder a track set is written to
    pub fn set_folder(&self, set: &TrackSet) -> PathBuf {
        if set.is_album() {
            self.album_naming.name_of(&self.root, set)
        } else {
            self.loose_set_naming.name_of(&self.root, set)
        }
    }
}

impl fmt::Debug for SaveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveOptions")
            .field("root", &self.root)
            .field("save_cover_art_separately", &self.save_cover_art_separately)
            .field("write_tags", &self.write_tags)
            .finish_non_exhaustive()
    }
}
