//! services/client/src/adapters/story_api.rs
//!
//! Adapter for the backend's `/api/story` endpoints, implementing the
//! `StoryService` port. Every call is authenticated with the token currently
//! held in session storage.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::adapters::http::{
    bearer_token, field, optional_field, to_body, ApiRequest, HttpTransport,
};
use decipher_core::domain::{ParagraphEdit, Story, StoryDraft, StoryList, StoryUpdate};
use decipher_core::ports::{ServiceResult, SessionStorage, StoryService};

#[derive(Clone)]
pub struct HttpStoryAdapter {
    http: HttpTransport,
    storage: Arc<dyn SessionStorage>,
}

impl HttpStoryAdapter {
    pub fn new(http: HttpTransport, storage: Arc<dyn SessionStorage>) -> Self {
        Self { http, storage }
    }

    async fn call(&self, request: ApiRequest<'_>, default_message: &str) -> ServiceResult<Value> {
        let token = bearer_token(self.storage.as_ref()).await?;
        let request = request.bearer(token.as_deref());
        self.http.execute(request).await?.envelope(default_message)
    }
}

const STORIES: &str = "/api/story";

#[async_trait]
impl StoryService for HttpStoryAdapter {
    async fn create_story(&self, draft: &StoryDraft) -> ServiceResult<Story> {
        let value = self
            .call(
                ApiRequest::post("/api/story/create", to_body(draft)?),
                "Failed to create story",
            )
            .await?;
        field(&value, "/story")
    }

    async fn list_stories(&self) -> ServiceResult<StoryList> {
        let value = self
            .call(ApiRequest::get("/api/story/"), "Failed to fetch stories")
            .await?;
        let stories: Vec<Story> = optional_field(&value, "/stories")?.unwrap_or_default();
        let count = optional_field(&value, "/count")?.unwrap_or(stories.len());
        Ok(StoryList { stories, count })
    }

    async fn get_story(&self, story_id: &str) -> ServiceResult<Story> {
        let value = self
            .call(ApiRequest::get(STORIES).segment(story_id), "Failed to fetch story")
            .await?;
        field(&value, "/story")
    }

    async fn update_story(&self, story_id: &str, update: &StoryUpdate) -> ServiceResult<Story> {
        let value = self
            .call(
                ApiRequest::put(STORIES, to_body(update)?).segment(story_id),
                "Failed to update story",
            )
            .await?;
        field(&value, "/story")
    }

    async fn delete_story(&self, story_id: &str) -> ServiceResult<String> {
        let value = self
            .call(ApiRequest::delete(STORIES).segment(story_id), "Failed to delete story")
            .await?;
        Ok(optional_field(&value, "/message")?.unwrap_or_default())
    }

    async fn regenerate(&self, story_id: &str, model: &str) -> ServiceResult<Story> {
        let request = ApiRequest::get("/api/story/regenerate")
            .segment(story_id)
            .query("model", model);
        let value = self
            .call(request, "Failed to regenerate story chunk")
            .await?;
        field(&value, "/story")
    }

    async fn continue_story(&self, story_id: &str, model: &str) -> ServiceResult<Story> {
        let request = ApiRequest::post("/api/story/continue", json!({ "model": model }))
            .segment(story_id);
        let value = self.call(request, "Failed to continue story").await?;
        field(&value, "/story")
    }

    async fn edit_last_paragraph(
        &self,
        story_id: &str,
        instruction: &str,
        model: &str,
    ) -> ServiceResult<ParagraphEdit> {
        let request = ApiRequest::patch(
            "/api/story/edit",
            json!({ "minorEditInstruction": instruction, "model": model }),
        )
        .segment(story_id);
        let value = self.call(request, "Failed to edit story").await?;
        Ok(ParagraphEdit {
            story: field(&value, "/story")?,
            revised_chunk: optional_field(&value, "/revisedChunk")?,
        })
    }

    async fn edit_chunk(
        &self,
        story_id: &str,
        chunk_index: u32,
        content: &str,
    ) -> ServiceResult<Story> {
        let request = ApiRequest::patch(
            "/api/story/edit-chunk",
            json!({ "chunkIndex": chunk_index, "newContent": content }),
        )
        .segment(story_id);
        let value = self.call(request, "Failed to edit chunk").await?;
        field(&value, "/story")
    }
}
