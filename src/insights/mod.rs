/// Kitchen insights from a generative-AI provider
///
/// The provider sees the owner's pantry and grocery list and answers with a
/// JSON array of suggestions. Insights are never critical: a missing key, a
/// provider error, a timeout or an unparseable reply all yield the static
/// suggestions instead.
use crate::{
    config::InsightsConfig,
    error::{PantryError, PantryResult},
    ledger::{GroceryItem, PantryItem},
    metrics,
};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{sync::Arc, time::Duration};

/// Hint returned when no provider key is configured
pub const CONFIGURE_HINT: &str = "Configure GEMINI_API_KEY for real insights";

/// A single actionable suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub message: String,
    pub action: String,
}

/// Where a set of suggestions came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightSource {
    Ai,
    Fallback,
}

/// Insight response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insights {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub suggestions: Vec<Suggestion>,
    pub source: InsightSource,
}

impl Insights {
    fn fallback(message: Option<&str>) -> Self {
        Self {
            message: message.map(str::to_string),
            suggestions: static_suggestions(),
            source: InsightSource::Fallback,
        }
    }
}

/// Suggestions served when the provider cannot be used
pub fn static_suggestions() -> Vec<Suggestion> {
    vec![
        Suggestion {
            message: "You're low on Rice. Add to grocery list?".to_string(),
            action: "Add Rice".to_string(),
        },
        Suggestion {
            message: "You have excess Milk expiring soon. Plan a pudding?".to_string(),
            action: "Plan Meal".to_string(),
        },
    ]
}

/// Something that turns a prompt into model text
#[async_trait]
pub trait InsightProvider: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn generate(&self, prompt: &str) -> PantryResult<String>;
}

/// Gemini `generateContent` client
pub struct GeminiClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
}

impl GeminiClient {
    pub fn new(config: &InsightsConfig) -> PantryResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("PantryIQ/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PantryError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl InsightProvider for GeminiClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, prompt: &str) -> PantryResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| PantryError::Upstream("No API key configured".to_string()))?;

        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        let response = self
            .http_client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }]
            }))
            .send()
            .await
            .map_err(|e| PantryError::Upstream(format!("Insight request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(PantryError::Upstream(format!(
                "Insight provider returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PantryError::Upstream(format!("Invalid provider response: {}", e)))?;

        body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| PantryError::Upstream("Provider response had no text".to_string()))
    }
}

/// Build the provider prompt from the owner's kitchen state
pub fn build_prompt(pantry: &[PantryItem], grocery: &[GroceryItem]) -> String {
    let inventory: Vec<String> = pantry
        .iter()
        .map(|i| format!("{} ({} {})", i.name, i.quantity, i.unit))
        .collect();
    let list: Vec<&str> = grocery.iter().map(|i| i.name.as_str()).collect();

    format!(
        "Act as a smart home pantry assistant.\n\
         Here is my pantry inventory: {}.\n\
         Here is my current grocery list: {}.\n\n\
         Generate 3 short, actionable suggestions to help me manage my kitchen better. \
         Focus on food waste prevention, restocking essentials, or meal ideas based on available ingredients.\n\
         Return ONLY a valid JSON array of objects with 'message' and 'action' keys. \
         Do not include markdown formatting or extra text.",
        json!(inventory),
        json!(list)
    )
}

/// Extract the suggestion array from model text: first `[` through last `]`
pub fn parse_suggestions(text: &str) -> anyhow::Result<Vec<Suggestion>> {
    let start = text.find('[').ok_or_else(|| anyhow!("No JSON array found"))?;
    let end = text.rfind(']').ok_or_else(|| anyhow!("No JSON array found"))?;
    if end < start {
        return Err(anyhow!("No JSON array found"));
    }

    let suggestions: Vec<Suggestion> =
        serde_json::from_str(&text[start..=end]).context("Suggestion array is malformed")?;
    if suggestions.is_empty() {
        return Err(anyhow!("Suggestion array is empty"));
    }

    Ok(suggestions)
}

/// Insight service with bounded wait and static fallback
pub struct InsightService {
    provider: Arc<dyn InsightProvider>,
    timeout: Duration,
}

impl InsightService {
    pub fn new(provider: Arc<dyn InsightProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Suggestions for an owner's kitchen. Never fails.
    pub async fn suggestions(&self, pantry: &[PantryItem], grocery: &[GroceryItem]) -> Insights {
        if !self.provider.is_configured() {
            metrics::record_insight_fallback("unconfigured");
            return Insights::fallback(Some(CONFIGURE_HINT));
        }

        let prompt = build_prompt(pantry, grocery);
        let text = match tokio::time::timeout(self.timeout, self.provider.generate(&prompt)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!("Insight provider failed: {}", e);
                metrics::record_insight_fallback("error");
                return Insights::fallback(None);
            }
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "Insight provider timed out");
                metrics::record_insight_fallback("timeout");
                return Insights::fallback(None);
            }
        };

        match parse_suggestions(&text) {
            Ok(suggestions) => Insights {
                message: None,
                suggestions,
                source: InsightSource::Ai,
            },
            Err(e) => {
                tracing::warn!("Could not parse insight reply: {:#}", e);
                tracing::debug!(reply = %text, "Raw insight reply");
                metrics::record_insight_fallback("unparseable");
                Insights::fallback(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider {
        reply: PantryResult<String>,
        delay: Duration,
    }

    #[async_trait]
    impl InsightProvider for FixedProvider {
        fn is_configured(&self) -> bool {
            true
        }

        async fn generate(&self, _prompt: &str) -> PantryResult<String> {
            tokio::time::sleep(self.delay).await;
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(PantryError::Upstream(e.to_string())),
            }
        }
    }

    fn service(reply: PantryResult<String>, delay: Duration) -> InsightService {
        InsightService::new(
            Arc::new(FixedProvider { reply, delay }),
            Duration::from_millis(200),
        )
    }

    #[test]
    fn test_parse_suggestions_from_noisy_reply() {
        let text = "Sure!\n```json\n[{\"message\": \"Use the spinach\", \"action\": \"Plan Meal\"}]\n```";
        let parsed = parse_suggestions(text).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].action, "Plan Meal");
    }

    #[test]
    fn test_parse_suggestions_rejects_garbage() {
        assert!(parse_suggestions("no array here").is_err());
        assert!(parse_suggestions("] backwards [").is_err());
        assert!(parse_suggestions("[1, 2, 3]").is_err());
    }

    #[tokio::test]
    async fn test_unconfigured_provider_uses_static_suggestions() {
        let client = GeminiClient::new(&InsightsConfig {
            api_key: None,
            model: "m".to_string(),
            endpoint: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
        })
        .unwrap();
        let service = InsightService::new(Arc::new(client), Duration::from_secs(1));

        let insights = service.suggestions(&[], &[]).await;
        assert_eq!(insights.source, InsightSource::Fallback);
        assert_eq!(insights.message.as_deref(), Some(CONFIGURE_HINT));
        assert_eq!(insights.suggestions, static_suggestions());
    }

    #[tokio::test]
    async fn test_provider_reply_is_relayed() {
        let reply = r#"[{"message":"Restock oil","action":"Add Oil"}]"#.to_string();
        let insights = service(Ok(reply), Duration::ZERO).suggestions(&[], &[]).await;
        assert_eq!(insights.source, InsightSource::Ai);
        assert_eq!(insights.suggestions[0].action, "Add Oil");
    }

    #[tokio::test]
    async fn test_provider_error_and_timeout_fall_back() {
        let failed = service(Err(PantryError::Upstream("boom".into())), Duration::ZERO)
            .suggestions(&[], &[])
            .await;
        assert_eq!(failed.source, InsightSource::Fallback);
        assert!(failed.message.is_none());

        let slow = service(Ok("[]".to_string()), Duration::from_secs(5))
            .suggestions(&[], &[])
            .await;
        assert_eq!(slow.source, InsightSource::Fallback);
        assert_eq!(slow.suggestions, static_suggestions());
    }
}
