pub mod domain;
pub mod editor;
pub mod navigation;
pub mod ports;
pub mod session;
pub mod storage;
pub mod validation;
pub mod wizard;

#[cfg(test)]
mod testing;

pub use domain::{
    AuthGrant, ContentRating, EditAction, ParagraphEdit, RegisterRequest, Registration, Scenario,
    ScenarioEntity, ScenarioList, Session, Story, StoryChunk, StoryDraft, StoryList, StoryStats,
    StoryUpdate, User, Visibility,
};
pub use editor::StoryEditor;
pub use navigation::{guard, GuardPolicy, NavDecision, Navigator};
pub use ports::{
    AuthService, PortError, PortResult, ScenarioService, ServiceError, ServiceResult,
    SessionStorage, Slot, StoryService,
};
pub use session::{SessionSnapshot, SessionStore};
pub use storage::MemorySessionStorage;
pub use wizard::{StoryWizard, WizardError, WizardStep};
