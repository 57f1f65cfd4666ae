//! crates/decipher_core/src/wizard.rs
//!
//! The three-step story creation flow: pick a setting, pick an archetype,
//! name the character. A successful submit hands the created story to a
//! `StoryEditor`.

use std::sync::Arc;
use tracing::{error, info};

use crate::domain::StoryDraft;
use crate::editor::StoryEditor;
use crate::ports::{ServiceError, StoryService};

pub const SETTINGS: [&str; 6] = [
    "Fantasy Kingdom",
    "Cyberpunk City",
    "Haunted Mansion",
    "Space Station",
    "Post-Apocalyptic Wasteland",
    "Pirate Seas",
];

pub const ARCHETYPES: [&str; 6] = [
    "Hero",
    "Villain",
    "Detective",
    "Explorer",
    "Rogue",
    "Scholar",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Setting,
    Character,
    Name,
    Created,
}

impl WizardStep {
    /// The step number shown to the user. `Created` stays on the last step.
    pub fn number(self) -> u8 {
        match self {
            WizardStep::Setting => 1,
            WizardStep::Character => 2,
            WizardStep::Name | WizardStep::Created => 3,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("Cannot {action} at the {step:?} step")]
    WrongStep {
        action: &'static str,
        step: WizardStep,
    },
    #[error("{0}")]
    Service(#[from] ServiceError),
}

pub struct StoryWizard {
    stories: Arc<dyn StoryService>,
    model: String,
    step: WizardStep,
    setting: Option<String>,
    archetype: Option<String>,
    character_name: Option<String>,
    error: Option<String>,
    editor: Option<Arc<StoryEditor>>,
}

impl StoryWizard {
    pub fn new(stories: Arc<dyn StoryService>, model: impl Into<String>) -> Self {
        Self {
            stories,
            model: model.into(),
            step: WizardStep::Setting,
            setting: None,
            archetype: None,
            character_name: None,
            error: None,
            editor: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn setting(&self) -> Option<&str> {
        self.setting.as_deref()
    }

    pub fn archetype(&self) -> Option<&str> {
        self.archetype.as_deref()
    }

    pub fn character_name(&self) -> Option<&str> {
        self.character_name.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The editor for the created story, once there is one.
    pub fn editor(&self) -> Option<Arc<StoryEditor>> {
        self.editor.clone()
    }

    fn expect_step(&self, step: WizardStep, action: &'static str) -> Result<(), WizardError> {
        if self.step == step {
            Ok(())
        } else {
            Err(WizardError::WrongStep {
                action,
                step: self.step,
            })
        }
    }

    /// Picks one of the built-in settings.
    pub fn select_setting(&mut self, setting: &str) -> Result<(), WizardError> {
        self.expect_step(WizardStep::Setting, "select a setting")?;
        if !SETTINGS.contains(&setting) {
            return Err(ServiceError::validation(format!("Unknown setting: {setting}")).into());
        }
        self.setting = Some(setting.to_string());
        self.step = WizardStep::Character;
        Ok(())
    }

    pub fn submit_custom_setting(&mut self, text: &str) -> Result<(), WizardError> {
        self.expect_step(WizardStep::Setting, "submit a setting")?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::validation("Please describe your setting").into());
        }
        self.setting = Some(text.to_string());
        self.step = WizardStep::Character;
        Ok(())
    }

    pub fn select_archetype(&mut self, archetype: &str) -> Result<(), WizardError> {
        self.expect_step(WizardStep::Character, "select an archetype")?;
        let archetype = archetype.trim();
        if archetype.is_empty() {
            return Err(ServiceError::validation("Please choose a character").into());
        }
        self.archetype = Some(archetype.to_string());
        self.step = WizardStep::Name;
        Ok(())
    }

    /// Goes back one step, clearing what was chosen on the step being left.
    pub fn back(&mut self) {
        match self.step {
            WizardStep::Character => {
                self.setting = None;
                self.step = WizardStep::Setting;
            }
            WizardStep::Name => {
                self.archetype = None;
                self.character_name = None;
                self.step = WizardStep::Character;
            }
            WizardStep::Setting | WizardStep::Created => {}
        }
        self.error = None;
    }

    /// Creates the story. On failure the wizard stays on the name step with
    /// `error` set.
    pub async fn submit_name(&mut self, name: &str) -> Result<Arc<StoryEditor>, WizardError> {
        self.expect_step(WizardStep::Name, "submit a name")?;
        let name = name.trim();
        if name.is_empty() {
            let err = ServiceError::validation("Please enter a character name");
            self.error = Some(err.to_string());
            return Err(err.into());
        }
        self.character_name = Some(name.to_string());

        let draft = StoryDraft {
            setting: self.setting.clone().unwrap_or_default(),
            character: self.archetype.clone().unwrap_or_default(),
            character_name: name.to_string(),
        };

        match self.stories.create_story(&draft).await {
            Ok(story) => {
                info!("Created story {:?} for {}", story.id, draft.character_name);
                let editor = Arc::new(StoryEditor::new(
                    self.stories.clone(),
                    story,
                    self.model.clone(),
                ));
                self.editor = Some(editor.clone());
                self.error = None;
                self.step = WizardStep::Created;
                Ok(editor)
            }
            Err(e) => {
                error!("Failed to create story: {:?}", e);
                self.error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Starts over. Any editor handed out earlier is detached.
    pub fn new_story(&mut self) {
        if let Some(editor) = self.editor.take() {
            editor.detach();
        }
        self.step = WizardStep::Setting;
        self.setting = None;
        self.archetype = None;
        self.character_name = None;
        self.error = None;
    }
}
