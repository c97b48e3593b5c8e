use super::CompletionProvider;
use crate::result::Spec2IrResult;
use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};

/// Base URL of the demo login page
const DEMO_BASE_URL: &str = "https://10.2.97.255:9443";

/// Deterministic provider.
///
/// By default it answers every prompt with the IR of the demo login case;
/// [`MockProvider::with_response`] scripts any other text. Every prompt pair
/// it receives is kept for inspection.
#[derive(Debug, Clone)]
pub struct MockProvider {
    response: String,
    prompts: Arc<Mutex<Vec<(String, String)>>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::with_response(login_ir().to_string())
    }
}

impl MockProvider {
    /// Provider answering with the demo login IR
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider answering with `response`
    #[must_use]
    pub fn with_response(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            prompts: Arc::default(),
        }
    }

    /// Every (system, user) pair received so far
    #[must_use]
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

fn login_ir() -> serde_json::Value {
    json!({
        "id": "waf_login_1",
        "desc": "登录功能正向测试",
        "env_base_url": DEMO_BASE_URL,
        "ignore_https_errors": true,
        "actions": [
            {"op": "goto", "url": format!("{DEMO_BASE_URL}/"), "wait_until": "domcontentloaded"},
            {
                "op": "fill",
                "locator": {"kind": "role", "value": "textbox", "name": "用户名"},
                "value": "${ADMIN_USER}"
            },
            {
                "op": "fill",
                "locator": {"kind": "label", "value": "密码"},
                "value": "${ADMIN_PASS}"
            },
            {
                "op": "click",
                "locator": {"kind": "role", "value": "button", "name": "登录"}
            },
            {"op": "wait_for", "target": "url", "value": "/statistics", "timeout_ms": 15000}
        ],
        "expects": [
            {"kind": "url_is", "value": "/statistics"}
        ],
        "tags": ["smoke", "auth"]
    })
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, system: &str, user: &str) -> Spec2IrResult<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push((system.to_string(), user.to_string()));
        }
        Ok(self.response.clone())
    }
}
