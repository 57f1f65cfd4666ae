//! services/client/src/adapters/scenario_api.rs
//!
//! Adapter for the backend's `/api/scenario` endpoints, implementing the
//! `ScenarioService` port. Drafts are trimmed and validated locally before
//! they are sent.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::adapters::http::{
    bearer_token, field, optional_field, to_body, ApiRequest, HttpTransport,
};
use decipher_core::domain::{Scenario, ScenarioList, Story};
use decipher_core::ports::{ScenarioService, ServiceResult, SessionStorage};
use decipher_core::validation::validate_scenario;

#[derive(Clone)]
pub struct HttpScenarioAdapter {
    http: HttpTransport,
    storage: Arc<dyn SessionStorage>,
}

impl HttpScenarioAdapter {
    pub fn new(http: HttpTransport, storage: Arc<dyn SessionStorage>) -> Self {
        Self { http, storage }
    }

    async fn call(&self, request: ApiRequest<'_>, default_message: &str) -> ServiceResult<Value> {
        let token = bearer_token(self.storage.as_ref()).await?;
        let request = request.bearer(token.as_deref());
        self.http.execute(request).await?.envelope(default_message)
    }
}

const SCENARIOS: &str = "/api/scenario";

/// Trims the draft and checks it before anything is sent.
fn prepare(scenario: &Scenario) -> ServiceResult<Value> {
    let scenario = scenario.trimmed();
    validate_scenario(&scenario)?;
    to_body(&scenario)
}

#[async_trait]
impl ScenarioService for HttpScenarioAdapter {
    async fn create_scenario(&self, scenario: &Scenario) -> ServiceResult<Scenario> {
        let body = prepare(scenario)?;
        let value = self
            .call(
                ApiRequest::post("/api/scenario/create", body),
                "Failed to create scenario",
            )
            .await?;
        field(&value, "/scenario")
    }

    async fn list_scenarios(&self) -> ServiceResult<ScenarioList> {
        let value = self
            .call(ApiRequest::get("/api/scenario/"), "Failed to fetch scenarios")
            .await?;
        let scenarios: Vec<Scenario> = optional_field(&value, "/scenarios")?.unwrap_or_default();
        let count = optional_field(&value, "/count")?.unwrap_or(scenarios.len());
        Ok(ScenarioList { scenarios, count })
    }

    async fn get_scenario(&self, scenario_id: &str) -> ServiceResult<Scenario> {
        let value = self
            .call(
                ApiRequest::get(SCENARIOS).segment(scenario_id),
                "Failed to fetch scenario",
            )
            .await?;
        field(&value, "/scenario")
    }

    async fn update_scenario(
        &self,
        scenario_id: &str,
        scenario: &Scenario,
    ) -> ServiceResult<Scenario> {
        let body = prepare(scenario)?;
        let value = self
            .call(
                ApiRequest::put(SCENARIOS, body).segment(scenario_id),
                "Failed to update scenario",
            )
            .await?;
        field(&value, "/scenario")
    }

    async fn delete_scenario(&self, scenario_id: &str) -> ServiceResult<String> {
        let value = self
            .call(
                ApiRequest::delete(SCENARIOS).segment(scenario_id),
                "Failed to delete scenario",
            )
            .await?;
        Ok(optional_field(&value, "/message")?.unwrap_or_default())
    }

    async fn scenario_stories(&self, scenario_id: &str) -> ServiceResult<Vec<Story>> {
        let value = self
            .call(
                ApiRequest::get(SCENARIOS)
                    .segment(scenario_id)
                    .segment("stories"),
                "Failed to fetch scenario stories",
            )
            .await?;
        Ok(optional_field(&value, "/stories")?.unwrap_or_default())
    }
}
