//! crates/decipher_core/src/domain.rs
//!
//! Defines the core data structures shared by the session store, the story
//! wizard and the service ports. Field names follow the backend's JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

//=========================================================================================
// Accounts and Sessions
//=========================================================================================

/// The authenticated account, as returned by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A logged-in user together with their bearer token.
///
/// The pair only ever exists as a whole: there is no way to hold a user
/// without a token or the other way around.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: User,
    pub token: String,
}

/// What the backend hands out after login, OTP verification or password reset.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthGrant {
    pub user: User,
    pub token: String,
    pub message: Option<String>,
}

/// Outcome of a successful registration. Registration never logs the user in.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub message: Option<String>,
    pub requires_verification: bool,
    pub email: Option<String>,
}

/// Fields submitted on the sign-up form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

//=========================================================================================
// Stories
//=========================================================================================

/// One AI-generated segment of a story.
///
/// `index` is a stable key assigned by the backend; it survives deletions of
/// other chunks and is never recomputed from the chunk's array position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryChunk {
    pub index: u32,
    pub content: String,
}

/// Counters the backend recomputes after every mutating action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryStats {
    #[serde(default)]
    pub words: u64,
    #[serde(default)]
    pub characters: u64,
    #[serde(default)]
    pub paragraphs: u64,
    #[serde(default)]
    pub reading_time: f64,
}

/// A story document. The authoritative copy lives server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    #[serde(rename = "_id", alias = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub setting: String,
    #[serde(default)]
    pub character: String,
    #[serde(default)]
    pub character_name: String,
    #[serde(rename = "MainStory", default)]
    pub main_story: Vec<StoryChunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_stats: Option<StoryStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Story {
    /// Looks a chunk up by its stable `index`, not by its position.
    pub fn chunk(&self, index: u32) -> Option<&StoryChunk> {
        self.main_story.iter().find(|chunk| chunk.index == index)
    }

    /// The chunks that remain once the chunk carrying `index` is removed.
    pub fn chunks_without(&self, index: u32) -> Vec<StoryChunk> {
        self.main_story
            .iter()
            .filter(|chunk| chunk.index != index)
            .cloned()
            .collect()
    }
}

/// The three creation-time parameters sent to the create-story endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryDraft {
    pub setting: String,
    pub character: String,
    pub character_name: String,
}

/// A partial update for `PUT /api/story/:id`. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "MainStory", skip_serializing_if = "Option::is_none")]
    pub main_story: Option<Vec<StoryChunk>>,
}

/// Result of the "edit last paragraph" action.
#[derive(Debug, Clone, PartialEq)]
pub struct ParagraphEdit {
    pub story: Story,
    pub revised_chunk: Option<String>,
}

/// A page of stories plus the total the backend reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoryList {
    pub stories: Vec<Story>,
    pub count: usize,
}

/// The mutating actions a loaded story accepts. At most one runs at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditAction {
    Regenerate,
    Continue,
    Edit,
    EditChunk,
}

impl fmt::Display for EditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EditAction::Regenerate => "regenerate",
            EditAction::Continue => "continue",
            EditAction::Edit => "edit",
            EditAction::EditChunk => "edit-chunk",
        };
        f.write_str(name)
    }
}

//=========================================================================================
// Scenarios
//=========================================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Unlisted,
    Published,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentRating {
    #[default]
    Unrated,
    Everyone,
    Teen,
    Mature,
}

/// A named character, location or creature attached to a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioEntity {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A reusable world definition that stories can be spawned from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(rename = "_id", alias = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub content_rating: ContentRating,
    #[serde(default)]
    pub opening: String,
    #[serde(rename = "AIInstructions", default)]
    pub ai_instructions: String,
    #[serde(default)]
    pub author_notes: String,
    #[serde(default)]
    pub characters: Vec<ScenarioEntity>,
    #[serde(default)]
    pub locations: Vec<ScenarioEntity>,
    #[serde(default)]
    pub creatures: Vec<ScenarioEntity>,
}

impl Scenario {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Adds a trimmed tag unless it is blank or already present.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.tags.iter().any(|t| t == tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    /// Returns a copy with every free-text field trimmed, as submitted by the editor.
    pub fn trimmed(&self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            opening: self.opening.trim().to_string(),
            ai_instructions: self.ai_instructions.trim().to_string(),
            author_notes: self.author_notes.trim().to_string(),
            ..self.clone()
        }
    }
}

impl ScenarioEntity {
    /// Builds an entity from editor input; blank names are refused.
    pub fn new(name: &str, description: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            description: description.trim().to_string(),
        })
    }
}

/// A page of scenarios plus the total the backend reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioList {
    pub scenarios: Vec<Scenario>,
    pub count: usize,
}
