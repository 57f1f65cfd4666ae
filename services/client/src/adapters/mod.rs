pub mod auth_api;
pub mod http;
pub mod scenario_api;
pub mod storage;
pub mod story_api;

pub use auth_api::HttpAuthAdapter;
pub use http::{ApiRequest, HttpTransport, RawReply};
pub use scenario_api::HttpScenarioAdapter;
pub use storage::FileSessionStorage;
pub use story_api::HttpStoryAdapter;
