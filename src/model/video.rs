use std::path::PathBuf;

use url::Url;

use super::*;

/// The platform identifier of a single video.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Name of the file the video content is stored in, inside its user's directory.
    pub fn file_name(&self) -> String {
        format!("{}.mp4", path_component(&self.0))
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, new)]
pub struct Video {
    pub video_id: VideoId,
    pub user_id: UserId,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub play_url: Option<Url>,
    /// Where the content was written, if it was downloaded.
    #[new(default)]
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[new(value = "now()")]
    pub discovered_at: Timestamp,
}
