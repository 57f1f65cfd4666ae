//! Hand-written port fakes shared by the unit tests of this crate.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{Notify, Semaphore};

use crate::domain::{
    AuthGrant, ParagraphEdit, RegisterRequest, Registration, Story, StoryChunk, StoryDraft,
    StoryList, StoryUpdate, User,
};
use crate::ports::{
    AuthService, PortError, PortResult, ServiceError, ServiceResult, SessionStorage, Slot,
    StoryService,
};

pub fn sample_user(email: &str) -> User {
    User {
        id: "u-1".into(),
        name: "Ada".into(),
        email: email.into(),
        avatar: None,
        is_email_verified: true,
        is_active: true,
        created_at: None,
    }
}

fn grant(token: &str) -> AuthGrant {
    AuthGrant {
        user: sample_user("ada@example.com"),
        token: token.into(),
        message: None,
    }
}

#[derive(Default)]
struct CallLog(Mutex<HashMap<&'static str, usize>>);

impl CallLog {
    fn hit(&self, name: &'static str) {
        *self.0.lock().unwrap().entry(name).or_default() += 1;
    }

    fn get(&self, name: &str) -> usize {
        self.0.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

//=========================================================================================
// Auth
//=========================================================================================

#[derive(Default)]
pub struct FakeAuth {
    calls: CallLog,
    login: Mutex<Option<ServiceResult<AuthGrant>>>,
    profile: Mutex<Option<ServiceResult<User>>>,
    logout: Mutex<Option<ServiceResult<()>>>,
    profile_hold: Option<Semaphore>,
    pub profile_started: Notify,
}

impl FakeAuth {
    /// Profile lookups wait for [`FakeAuth::release_profile`].
    pub fn holding_profile() -> Self {
        Self {
            profile_hold: Some(Semaphore::new(0)),
            ..Default::default()
        }
    }

    pub fn release_profile(&self) {
        if let Some(hold) = &self.profile_hold {
            hold.add_permits(1);
        }
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls.get(name)
    }

    pub fn set_login(&self, result: ServiceResult<AuthGrant>) {
        *self.login.lock().unwrap() = Some(result);
    }

    pub fn set_profile(&self, result: ServiceResult<User>) {
        *self.profile.lock().unwrap() = Some(result);
    }

    pub fn set_logout(&self, result: ServiceResult<()>) {
        *self.logout.lock().unwrap() = Some(result);
    }
}

#[async_trait]
impl AuthService for FakeAuth {
    async fn register(&self, request: &RegisterRequest) -> ServiceResult<Registration> {
        self.calls.hit("register");
        Ok(Registration {
            message: Some("Check your inbox".into()),
            requires_verification: true,
            email: Some(request.email.clone()),
        })
    }

    async fn login(&self, _: &str, _: &str, _: bool) -> ServiceResult<AuthGrant> {
        self.calls.hit("login");
        self.login
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(grant("tok-login")))
    }

    async fn logout(&self, _: &str) -> ServiceResult<()> {
        self.calls.hit("logout");
        self.logout.lock().unwrap().clone().unwrap_or(Ok(()))
    }

    async fn verify_otp(&self, _: &str, _: &str) -> ServiceResult<AuthGrant> {
        self.calls.hit("verify_otp");
        Ok(grant("tok-otp"))
    }

    async fn resend_verification(&self, _: &str) -> ServiceResult<String> {
        self.calls.hit("resend_verification");
        Ok("sent".into())
    }

    async fn forgot_password(&self, _: &str) -> ServiceResult<String> {
        self.calls.hit("forgot_password");
        Ok("sent".into())
    }

    async fn reset_password(&self, _: &str, _: &str, _: &str) -> ServiceResult<AuthGrant> {
        self.calls.hit("reset_password");
        Ok(grant("tok-reset"))
    }

    async fn profile(&self, _: &str) -> ServiceResult<User> {
        self.calls.hit("profile");
        self.profile_started.notify_one();
        if let Some(hold) = &self.profile_hold {
            if let Ok(permit) = hold.acquire().await {
                permit.forget();
            }
        }
        self.profile
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(sample_user("ada@example.com")))
    }

    async fn verify_email(&self, _: &str) -> ServiceResult<String> {
        self.calls.hit("verify_email");
        Ok("verified".into())
    }
}

/// Storage whose every operation fails.
pub struct FailingStorage;

#[async_trait]
impl SessionStorage for FailingStorage {
    async fn read(&self, _: Slot) -> PortResult<Option<String>> {
        Err(PortError::Storage("disk unavailable".into()))
    }

    async fn write(&self, _: Slot, _: &str) -> PortResult<()> {
        Err(PortError::Storage("disk unavailable".into()))
    }

    async fn remove(&self, _: Slot) -> PortResult<()> {
        Err(PortError::Storage("disk unavailable".into()))
    }
}

//=========================================================================================
// Stories
//=========================================================================================

pub fn story_with_chunks(indices: &[u32]) -> Story {
    Story {
        id: Some("s-1".into()),
        setting: "Haunted Mansion".into(),
        character: "Detective".into(),
        character_name: "Vera".into(),
        main_story: indices
            .iter()
            .map(|&index| StoryChunk {
                index,
                content: format!("chunk {index}"),
            })
            .collect(),
        ..Default::default()
    }
}

/// Story backend that records requests and can be told to hold responses
/// until released, or to fail.
pub struct FakeStories {
    calls: CallLog,
    pub requests: Mutex<Vec<String>>,
    hold: Option<Semaphore>,
    pub started: Notify,
    fail_with: Mutex<Option<ServiceError>>,
    stored: Mutex<Story>,
}

impl Default for FakeStories {
    fn default() -> Self {
        Self {
            calls: CallLog::default(),
            requests: Mutex::new(Vec::new()),
            hold: None,
            started: Notify::new(),
            fail_with: Mutex::new(None),
            stored: Mutex::new(story_with_chunks(&[0, 1, 2])),
        }
    }
}

impl FakeStories {
    /// Responses wait for [`FakeStories::release`].
    pub fn holding() -> Self {
        Self {
            hold: Some(Semaphore::new(0)),
            ..Default::default()
        }
    }

    pub fn release(&self) {
        if let Some(hold) = &self.hold {
            hold.add_permits(1);
        }
    }

    pub fn fail_with(&self, err: ServiceError) {
        *self.fail_with.lock().unwrap() = Some(err);
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls.get(name)
    }

    async fn answer(&self, name: &'static str, request: String) -> ServiceResult<Story> {
        self.calls.hit(name);
        self.requests.lock().unwrap().push(request);
        self.started.notify_one();
        if let Some(hold) = &self.hold {
            if let Ok(permit) = hold.acquire().await {
                permit.forget();
            }
        }
        if let Some(err) = self.fail_with.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.stored.lock().unwrap().clone())
    }

    fn mutate(&self, f: impl FnOnce(&mut Story)) {
        f(&mut *self.stored.lock().unwrap());
    }
}

#[async_trait]
impl StoryService for FakeStories {
    async fn create_story(&self, draft: &StoryDraft) -> ServiceResult<Story> {
        self.mutate(|s| {
            s.setting = draft.setting.clone();
            s.character = draft.character.clone();
            s.character_name = draft.character_name.clone();
        });
        self.answer("create_story", format!("create {}", draft.character_name))
            .await
    }

    async fn list_stories(&self) -> ServiceResult<StoryList> {
        let story = self.stored.lock().unwrap().clone();
        Ok(StoryList {
            stories: vec![story],
            count: 1,
        })
    }

    async fn get_story(&self, story_id: &str) -> ServiceResult<Story> {
        self.answer("get_story", format!("get {story_id}")).await
    }

    async fn update_story(&self, story_id: &str, update: &StoryUpdate) -> ServiceResult<Story> {
        if self.fail_with.lock().unwrap().is_none() {
            if let Some(chunks) = &update.main_story {
                let chunks = chunks.clone();
                self.mutate(|s| s.main_story = chunks);
            }
        }
        self.answer("update_story", format!("update {story_id}")).await
    }

    async fn delete_story(&self, story_id: &str) -> ServiceResult<String> {
        self.calls.hit("delete_story");
        Ok(format!("deleted {story_id}"))
    }

    async fn regenerate(&self, story_id: &str, model: &str) -> ServiceResult<Story> {
        self.answer("regenerate", format!("regenerate {story_id} {model}"))
            .await
    }

    async fn continue_story(&self, story_id: &str, model: &str) -> ServiceResult<Story> {
        if self.fail_with.lock().unwrap().is_none() {
            self.mutate(|s| {
                let next = s.main_story.iter().map(|c| c.index + 1).max().unwrap_or(0);
                s.main_story.push(StoryChunk {
                    index: next,
                    content: format!("chunk {next}"),
                });
            });
        }
        self.answer("continue_story", format!("continue {story_id} {model}"))
            .await
    }

    async fn edit_last_paragraph(
        &self,
        story_id: &str,
        instruction: &str,
        _model: &str,
    ) -> ServiceResult<ParagraphEdit> {
        let story = self
            .answer("edit_last_paragraph", format!("edit {story_id} {instruction}"))
            .await?;
        Ok(ParagraphEdit {
            story,
            revised_chunk: Some(instruction.to_string()),
        })
    }

    async fn edit_chunk(
        &self,
        story_id: &str,
        chunk_index: u32,
        content: &str,
    ) -> ServiceResult<Story> {
        if self.fail_with.lock().unwrap().is_none() {
            self.mutate(|s| {
                if let Some(chunk) = s.main_story.iter_mut().find(|c| c.index == chunk_index) {
                    chunk.content = content.to_string();
                }
            });
        }
        self.answer("edit_chunk", format!("edit-chunk {story_id} {chunk_index}"))
            .await
    }
}
