//! HTTP translation API client (LibreTranslate-compatible endpoint).
//! Connection pooling via reqwest with a hard client-level timeout. No
//! retry; the populate worker treats a failure as final.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{TranslateError, TranslationProvider};

pub struct HttpTranslator {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl HttpTranslator {
    /// Create a new client. Reads the optional `TRANSLATE_API_KEY` from the
    /// environment; public endpoints work without one.
    pub fn new(api_url: impl Into<String>) -> Result<Self, TranslateError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TranslateError::Api(e.to_string()))?;

        Ok(Self {
            http,
            api_url: api_url.into(),
            api_key: std::env::var("TRANSLATE_API_KEY").ok(),
        })
    }
}

#[async_trait]
impl TranslationProvider for HttpTranslator {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, TranslateError> {
        if target_lang.is_empty() {
            return Err(TranslateError::InvalidInput("empty target language".into()));
        }

        let mut payload = serde_json::json!({
            "q": text,
            "source": "auto",
            "target": target_lang,
            "format": "text",
        });
        if let Some(ref key) = self.api_key {
            payload["api_key"] = serde_json::Value::String(key.clone());
        }

        let result = self.http.post(&self.api_url).json(&payload).send().await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                let parsed: TranslateResponse = resp
                    .json()
                    .await
                    .map_err(|e| TranslateError::Api(format!("bad response body: {e}")))?;
                Ok(parsed.translated_text)
            }
            Ok(resp) => {
                let status = resp.status();
                let body_text = resp.text().await.unwrap_or_default();
                Err(TranslateError::Api(format!(
                    "unexpected status {}: {}",
                    status,
                    body_text.chars().take(200).collect::<String>()
                )))
            }
            Err(e) if e.is_timeout() => Err(TranslateError::Timeout),
            Err(e) => Err(TranslateError::Api(e.to_string())),
        }
    }
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}
