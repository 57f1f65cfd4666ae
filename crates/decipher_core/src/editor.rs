//! crates/decipher_core/src/editor.rs
//!
//! Editing a created story. Only one mutating action may be in flight per
//! editor: a second call is refused before it reaches the transport, never
//! queued. The backend's document always replaces the local copy.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use crate::domain::{EditAction, Story, StoryChunk, StoryUpdate};
use crate::ports::{ServiceError, ServiceResult, StoryService};

struct EditorState {
    story: Story,
    action: Option<EditAction>,
    last_error: Option<String>,
    revised_chunk: Option<String>,
    detached: bool,
}

pub struct StoryEditor {
    stories: Arc<dyn StoryService>,
    model: String,
    state: Mutex<EditorState>,
}

impl fmt::Debug for StoryEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("StoryEditor")
            .field("story_id", &state.story.id)
            .field("chunks", &state.story.main_story.len())
            .field("action", &state.action)
            .field("detached", &state.detached)
            .finish_non_exhaustive()
    }
}

/// Releases the action gate when the action finishes, however it finishes.
struct ActionGuard<'a> {
    editor: &'a StoryEditor,
}

impl Drop for ActionGuard<'_> {
    fn drop(&mut self) {
        self.editor.lock().action = None;
    }
}

impl StoryEditor {
    pub fn new(stories: Arc<dyn StoryService>, story: Story, model: impl Into<String>) -> Self {
        Self {
            stories,
            model: model.into(),
            state: Mutex::new(EditorState {
                story,
                action: None,
                last_error: None,
                revised_chunk: None,
                detached: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EditorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    //=====================================================================================
    // Accessors
    //=====================================================================================

    pub fn story(&self) -> Story {
        self.lock().story.clone()
    }

    pub fn story_id(&self) -> Option<String> {
        self.lock().story.id.clone()
    }

    /// Finds a chunk by its stable index.
    pub fn chunk(&self, index: u32) -> Option<StoryChunk> {
        self.lock().story.chunk(index).cloned()
    }

    /// The action currently running, if any.
    pub fn action_loading(&self) -> Option<EditAction> {
        self.lock().action
    }

    pub fn is_busy(&self) -> bool {
        self.action_loading().is_some()
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// The rewritten paragraph from the last successful edit action.
    pub fn revised_chunk(&self) -> Option<String> {
        self.lock().revised_chunk.clone()
    }

    /// Detaches the editor from the view. Results arriving afterwards are
    /// returned to their caller but no longer applied.
    pub fn detach(&self) {
        self.lock().detached = true;
    }

    pub fn is_detached(&self) -> bool {
        self.lock().detached
    }

    //=====================================================================================
    // Actions
    //=====================================================================================

    pub async fn regenerate(&self) -> ServiceResult<Story> {
        let (_guard, story_id, _) = self.claim(EditAction::Regenerate)?;
        let result = self.stories.regenerate(&story_id, &self.model).await;
        self.settle(result.as_ref(), None);
        result
    }

    pub async fn continue_story(&self) -> ServiceResult<Story> {
        let (_guard, story_id, _) = self.claim(EditAction::Continue)?;
        let result = self.stories.continue_story(&story_id, &self.model).await;
        self.settle(result.as_ref(), None);
        result
    }

    /// Rewrites the last paragraph following `instruction`.
    pub async fn edit_last_paragraph(&self, instruction: &str) -> ServiceResult<Story> {
        let (_guard, story_id, _) = self.claim(EditAction::Edit)?;
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(ServiceError::validation("Please enter an edit instruction"));
        }
        let result = self
            .stories
            .edit_last_paragraph(&story_id, instruction, &self.model)
            .await;
        match result {
            Ok(edit) => {
                self.settle(Ok(&edit.story), edit.revised_chunk);
                Ok(edit.story)
            }
            Err(e) => {
                self.settle(Err(&e), None);
                Err(e)
            }
        }
    }

    /// Replaces the text of the chunk whose stable index is `index`.
    pub async fn edit_chunk(&self, index: u32, content: &str) -> ServiceResult<Story> {
        let (_guard, story_id, story) = self.claim(EditAction::EditChunk)?;
        if story.chunk(index).is_none() {
            return Err(missing_chunk(index));
        }
        let content = content.trim();
        if content.is_empty() {
            return Err(ServiceError::validation("Chunk content cannot be empty"));
        }
        let result = self.stories.edit_chunk(&story_id, index, content).await;
        self.settle(result.as_ref(), None);
        result
    }

    /// Removes the chunk whose stable index is `index`. The remaining chunks
    /// keep their indices.
    pub async fn delete_chunk(&self, index: u32) -> ServiceResult<Story> {
        let (_guard, story_id, story) = self.claim(EditAction::EditChunk)?;
        if story.chunk(index).is_none() {
            return Err(missing_chunk(index));
        }
        let update = StoryUpdate {
            main_story: Some(story.chunks_without(index)),
            ..Default::default()
        };
        let result = self.stories.update_story(&story_id, &update).await;
        self.settle(result.as_ref(), None);
        result
    }

    //=====================================================================================
    // Internals
    //=====================================================================================

    /// Takes the gate for `action` and returns the story it applies to.
    fn claim(&self, action: EditAction) -> ServiceResult<(ActionGuard<'_>, String, Story)> {
        let mut state = self.lock();
        if let Some(running) = state.action {
            debug!("Refusing {} while {} is in flight", action, running);
            return Err(ServiceError::ActionInFlight(running));
        }
        let story_id = state
            .story
            .id
            .clone()
            .ok_or_else(|| ServiceError::validation("The story has not been created yet"))?;
        state.action = Some(action);
        let story = state.story.clone();
        drop(state);
        Ok((ActionGuard { editor: self }, story_id, story))
    }

    fn settle(&self, result: Result<&Story, &ServiceError>, revised_chunk: Option<String>) {
        let mut state = self.lock();
        if state.detached {
            debug!("Discarding story result that arrived after detach");
            return;
        }
        match result {
            Ok(story) => {
                state.story = story.clone();
                state.last_error = None;
                state.revised_chunk = revised_chunk;
            }
            Err(e) => {
                warn!("Story action failed: {}", e);
                state.last_error = Some(e.to_string());
            }
        }
    }
}

fn missing_chunk(index: u32) -> ServiceError {
    ServiceError::validation(format!("No chunk with index {index}"))
}
