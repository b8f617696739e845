//! Media attached to rounds (images, audio, video)
//!
//! A round may reference a single media asset that is shown alongside its
//! prompt. The runtime never loads media itself; it only needs to know that
//! a round has media so that the question timer can wait for an external
//! readiness signal.

use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::constants::round::{MAX_ALT_LENGTH, MAX_MEDIA_SRC_LENGTH};

/// Represents any kind of media content that can accompany a round
///
/// The variant is selected by the `kind` field of the source data, so a
/// question file entry looks like `{"kind": "image", "src": "...", "alt": "..."}`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Validate)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Media {
    /// A still image
    Image {
        /// Location of the image
        #[garde(length(min = 1, max = MAX_MEDIA_SRC_LENGTH))]
        src: String,
        /// Alternative text for accessibility
        #[garde(length(max = MAX_ALT_LENGTH))]
        #[serde(default)]
        alt: String,
    },
    /// An audio clip
    Audio {
        /// Location of the clip
        #[garde(length(min = 1, max = MAX_MEDIA_SRC_LENGTH))]
        src: String,
    },
    /// A video clip with an optional poster frame
    Video {
        /// Location of the clip
        #[garde(length(min = 1, max = MAX_MEDIA_SRC_LENGTH))]
        src: String,
        /// Location of the poster image shown before playback
        #[garde(length(max = MAX_MEDIA_SRC_LENGTH))]
        #[serde(default)]
        poster: Option<String>,
    },
}

impl Media {
    /// Returns the location of the primary asset
    pub fn src(&self) -> &str {
        match self {
            Self::Image { src, .. } | Self::Audio { src } | Self::Video { src, .. } => src,
        }
    }
}
