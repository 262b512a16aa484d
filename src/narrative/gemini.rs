//! Google Gemini narrative integration.
//!
//! Implements the `NarrativeGenerator` trait using the Generative
//! Language REST API. Handles prompt construction, response parsing,
//! and rate limiting with exponential backoff.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{dataset_line, NarrativeGenerator};
use crate::engine::MarketView;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Maximum retries on rate limit / server errors.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (ms).
const BASE_BACKOFF_MS: u64 = 1000;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct GeminiClient {
    http: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl GeminiClient {
    pub fn new(api_key: String, model: Option<String>, max_tokens: Option<u32>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to build Gemini HTTP client")?;

        Ok(Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        })
    }

    /// Send a generateContent request with retry + backoff.
    async fn call_api(&self, prompt: &str, temperature: Option<f64>) -> Result<String> {
        let url = format!("{GEMINI_API_BASE}/{}:generateContent", self.model);
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: Some(GenerationConfig {
                temperature,
                max_output_tokens: self.max_tokens,
            }),
        };

        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
                debug!(attempt, delay_ms = delay, "Retrying Gemini API call");
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }

            let resp = self
                .http
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .header("content-type", "application/json")
                .json(&request)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body: GenerateResponse = response
                            .json()
                            .await
                            .context("Failed to parse Gemini response")?;

                        let text = body
                            .candidates
                            .iter()
                            .filter_map(|c| c.content.as_ref())
                            .flat_map(|c| c.parts.iter())
                            .filter_map(|p| p.text.as_deref())
                            .collect::<Vec<_>>()
                            .join("");

                        if text.is_empty() {
                            anyhow::bail!("Gemini returned an empty response");
                        }
                        return Ok(text);
                    }

                    // Retryable errors: 429 (rate limit), 500+
                    if status.as_u16() == 429 || status.as_u16() >= 500 {
                        let error_text = response.text().await.unwrap_or_default();
                        warn!(status = %status, attempt, error = %error_text, "Retryable Gemini API error");
                        last_error = Some(format!("HTTP {status}: {error_text}"));
                        continue;
                    }

                    // Non-retryable error
                    let error_text = response.text().await.unwrap_or_default();
                    anyhow::bail!("Gemini API error {status}: {error_text}");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Gemini request failed");
                    last_error = Some(format!("Request error: {e}"));
                    continue;
                }
            }
        }

        anyhow::bail!(
            "Gemini API failed after {} retries: {}",
            MAX_RETRIES,
            last_error.unwrap_or_default()
        )
    }

    /// Build the landscape-briefing prompt for the whole market table.
    pub fn build_briefing_prompt(markets: &[MarketView]) -> String {
        let dataset = markets
            .iter()
            .map(dataset_line)
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "ROLE: Friendly Prediction Market Guide\n\
             TASK: Explain the current prediction market landscape to a beginner. \
             Help them find where the \"best deals\" are (the biggest price differences \
             between sites) and what to do.\n\n\
             DATASET:\n{dataset}\n\n\
             CRITICAL FORMATTING RULE:\n\
             - DO NOT use asterisks (**) for bolding or any other purpose.\n\
             - Use headers in the format [HEADER NAME] on a new line.\n\
             - Keep sentences short and clear.\n\n\
             REQUIRED OUTPUT STRUCTURE:\n\
             [TOP OPPORTUNITIES]\n\
             List 3 specific events with the biggest price differences. Tell the user \
             which site is \"cheaper\" to buy on.\n\n\
             [SIMPLE ACTION PLAN]\n\
             Give a clear 2-step guide on how a new user can take advantage of these \
             price differences today.\n\n\
             [MARKET INSIGHTS]\n\
             Why are these sites showing different prices? Explain it in plain English.\n\n\
             TONE: Helpful, clear, and encouraging. Avoid heavy financial jargon. \
             Use words like Deal, Savings, and Difference. No introductory or \
             concluding conversational filler."
        )
    }

    /// Build the single-market deep-dive prompt.
    pub fn build_deep_dive_prompt(view: &MarketView) -> String {
        let prices = view
            .market
            .quotes
            .quotes()
            .iter()
            .map(|(p, q)| format!("{}: {q}%", p.to_string().to_uppercase()))
            .collect::<Vec<_>>()
            .join(", ");
        let consensus = view
            .consensus
            .map(|c| c.to_string())
            .unwrap_or_else(|| "N/A".to_string());

        format!(
            "ROUTING TARGET: \"{}\"\n\
             PRICES: {prices}\n\
             CONSENSUS PRICE: {consensus}%\n\
             BIGGEST DIFFERENCE: {}%\n\n\
             In a friendly brief (max 90 words):\n\
             - DO NOT use asterisks.\n\
             - Which site has the lowest price right now?\n\
             - Is it a good deal compared to the other sites?\n\
             - Give one simple tip on why the user might choose one site over the other.",
            view.market.question, view.arb_gap,
        )
    }
}

#[async_trait]
impl NarrativeGenerator for GeminiClient {
    async fn market_briefing(&self, markets: &[MarketView]) -> Result<String> {
        let prompt = Self::build_briefing_prompt(markets);
        self.call_api(&prompt, None).await
    }

    async fn market_deep_dive(&self, market: &MarketView) -> Result<String> {
        let prompt = Self::build_deep_dive_prompt(market);
        // Low temperature: the deep dive should stick to the numbers
        self.call_api(&prompt, Some(0.1)).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
