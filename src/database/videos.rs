use super::*;
use crate::model::{UserId, Video, VideoId};

const VIDEO_FIELDS: &str =
    "video_id, user_id, description, created_at, play_url, file, discovered_at";

impl Database {
    pub async fn video_exists(&self, video_id: &VideoId) -> Result<bool> {
        let found: Vec<VideoId> = self
            .sql("SELECT VALUE video_id FROM type::thing('videos', $video_id)")
            .bind(("video_id", video_id))
            .fetch_first()
            .await?;

        Ok(!found.is_empty())
    }

    /// Insert the video, or replace what is stored under the same id.
    #[tracing::instrument(skip_all, fields(video_id = %video.video_id, user_id = %video.user_id))]
    pub async fn save_video(&self, video: &Video) -> Result<()> {
        self.sql("UPDATE type::thing('videos', $video_id) CONTENT $video RETURN NONE")
            .bind(("video_id", &video.video_id))
            .bind(("video", video))
            .execute()
            .await?;

        Ok(())
    }

    pub async fn videos_of(&self, user_id: &UserId) -> Result<Vec<Video>> {
        let query =
            format!("SELECT {VIDEO_FIELDS} FROM videos WHERE user_id = $user_id ORDER BY video_id");
        self.sql(&query)
            .bind(("user_id", user_id))
            .fetch_first()
            .await
    }
}
