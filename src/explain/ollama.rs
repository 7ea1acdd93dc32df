use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{EnergyStatistics, Explainer};
use crate::config::ExplainerConfig;

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
    top_p: f64,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Explainer backed by a local Ollama server (`/api/generate`)
#[derive(Clone)]
pub struct OllamaExplainer {
    base_url: String,
    model: String,
    temperature: f64,
    top_p: f64,
    statistics: Option<EnergyStatistics>,
    client: reqwest::Client,
}

impl OllamaExplainer {
    pub fn new(cfg: &ExplainerConfig, statistics: Option<EnergyStatistics>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("energy-forecast/0.1"));
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            base_url: cfg.base_url.clone(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            statistics,
            client,
        })
    }

    fn prompt(&self, forecast_value: f64, question: &str) -> String {
        let history = match &self.statistics {
            Some(stats) => stats.to_prompt_json(),
            None => "No energy data available.".to_string(),
        };
        format!(
            "You are an assistant explaining household energy consumption.\n\
             Historical consumption statistics: {history}\n\
             Current energy forecast: {forecast_value:.2} Wh\n\
             Time: {}\n\
             Question: {question}",
            Utc::now().format("%H:%M")
        )
    }
}

#[async_trait]
impl Explainer for OllamaExplainer {
    async fn explain(&self, forecast_value: f64, question: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let body = GenerateRequest {
            model: &self.model,
            prompt: self.prompt(forecast_value, question),
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                top_p: self.top_p,
            },
        };

        tracing::debug!(model = %self.model, %url, "requesting explanation");
        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .context("explanation POST failed")?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("explanation request returned {}: {}", status, text);
        }

        let parsed: GenerateResponse = resp.json().await.context("explanation decode failed")?;
        Ok(parsed.response.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String) -> ExplainerConfig {
        ExplainerConfig {
            base_url,
            timeout_secs: 5,
            ..ExplainerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_explain_posts_generate_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-oss:120b-cloud",
                "stream": false,
                "options": { "temperature": 0.3, "top_p": 0.9 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "gpt-oss:120b-cloud",
                "response": "  Usage peaks in the evening.  ",
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let stats = EnergyStatistics::from_values(&[50.0, 70.0]);
        let explainer = OllamaExplainer::new(&config(server.uri()), stats).unwrap();
        let answer = explainer
            .explain(62.5, "Why is usage high?")
            .await
            .unwrap();
        assert_eq!(answer, "Usage peaks in the evening.");
    }

    #[tokio::test]
    async fn test_upstream_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&server)
            .await;

        let explainer = OllamaExplainer::new(&config(server.uri()), None).unwrap();
        let err = explainer.explain(1.0, "?").await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_prompt_carries_context() {
        let stats = EnergyStatistics::from_values(&[10.0, 30.0]);
        let explainer = OllamaExplainer::new(&config("http://localhost:1".into()), stats).unwrap();
        let prompt = explainer.prompt(62.5, "What drives consumption?");
        assert!(prompt.contains("62.50 Wh"));
        assert!(prompt.contains("\"avg_consumption\":\"20.00 Wh\""));
        assert!(prompt.contains("Question: What drives consumption?"));
    }
}
