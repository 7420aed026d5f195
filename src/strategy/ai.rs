//! LLM-backed analysis strategy
//!
//! One completion call per invocation: a compact market context goes out, a
//! JSON trading signal is expected back. Anything that fails along the way
//! (timeout, HTTP error, malformed output, invalid levels) degrades to no
//! signal; the engine never trades on a response it could not validate.

use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::{EngineError, Result};
use crate::indicators::{macd, rsi, sma};
use crate::signal::{Signal, SignalType};
use crate::strategy::MarketView;

/// Completion-capable LLM endpoint.
pub trait LlmClient: Send + Sync {
    fn complete(&self, prompt: &str) -> BoxFuture<'_, Result<String>>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

/// HTTP client for a generateContent-style completion API.
#[derive(Debug, Clone)]
pub struct HttpLlmClient {
    config: LlmConfig,
    client: reqwest::Client,
}

impl HttpLlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Persistence(format!("http client init failed: {e}")))?;
        Ok(Self { config, client })
    }

    /// The endpoint URL; `{key}` in the configured URL is replaced by the
    /// API key, otherwise the key is appended as a query parameter.
    fn api_url(&self) -> String {
        if self.config.api_url.contains("{key}") {
            self.config.api_url.replace("{key}", &self.config.api_key)
        } else {
            format!(
                "{}/models/{}:generateContent?key={}",
                self.config.api_url.trim_end_matches('/'),
                self.config.model,
                self.config.api_key
            )
        }
    }
}

impl LlmClient for HttpLlmClient {
    fn complete(&self, prompt: &str) -> BoxFuture<'_, Result<String>> {
        let request = CompletionRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };
        let url = self.api_url();
        let timeout_secs = self.config.timeout_secs;
        Box::pin(async move {
            let response = self
                .client
                .post(&url)
                .json(&request)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        EngineError::ExternalServiceTimeout {
                            service: "llm".to_string(),
                            seconds: timeout_secs,
                        }
                    } else {
                        EngineError::strategy("AIAnalysis", format!("llm request failed: {e}"))
                    }
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(EngineError::strategy(
                    "AIAnalysis",
                    format!("llm returned {status}: {body}"),
                ));
            }

            let parsed: CompletionResponse = response
                .json()
                .await
                .map_err(|e| EngineError::strategy("AIAnalysis", format!("llm response decode: {e}")))?;
            parsed
                .candidates
                .into_iter()
                .next()
                .and_then(|c| c.content.parts.into_iter().next())
                .map(|p| p.text)
                .ok_or_else(|| EngineError::strategy("AIAnalysis", "empty llm response"))
        })
    }
}

/// Shape the model is asked to answer with.
#[derive(Debug, Deserialize)]
struct ParsedAiSignal {
    signal_type: String,
    confidence: Option<f64>,
    entry_price: Option<f64>,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiAnalysisParams {
    /// Candles summarized into the prompt.
    pub context_candles: usize,
}

impl Default for AiAnalysisParams {
    fn default() -> Self {
        Self {
            context_candles: 30,
        }
    }
}

/// The AI analysis strategy. Not a [`super::Strategy`] implementor: its run
/// is async and the registry dispatches it on a dedicated path.
pub struct AiAnalysisStrategy {
    params: AiAnalysisParams,
    client: Box<dyn LlmClient>,
}

impl AiAnalysisStrategy {
    pub const NAME: &'static str = "AIAnalysis";

    pub fn new(params: AiAnalysisParams, client: Box<dyn LlmClient>) -> Self {
        Self { params, client }
    }

    pub fn name(&self) -> &str {
        Self::NAME
    }

    pub fn description(&self) -> &str {
        "One LLM call over a compact market context, parsed into a validated signal"
    }

    pub fn parameters(&self) -> serde_json::Value {
        json!(self.params)
    }

    /// Run one analysis. Unusable model output comes back as an empty signal
    /// list, already logged; transport failures and timeouts surface as
    /// errors for the registry to record.
    pub async fn run(&self, market: &MarketView<'_>) -> Result<Vec<Signal>> {
        let prompt = self.build_prompt(market);
        let text = self.client.complete(&prompt).await?;
        Ok(self.signal_from_response(market, &text))
    }

    /// Compact market context plus strict output instructions.
    fn build_prompt(&self, market: &MarketView<'_>) -> String {
        let candles = market.candles;
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let i = closes.len().saturating_sub(1);

        let mut prompt = format!(
            "You are a crypto trading analyst. Analyze {} on the {} timeframe.\n\nRecent candles (oldest first, OHLCV):\n",
            market.symbol, market.interval
        );
        let skip = candles.len().saturating_sub(self.params.context_candles);
        for c in &candles[skip..] {
            prompt.push_str(&format!(
                "{} O:{:.4} H:{:.4} L:{:.4} C:{:.4} V:{:.2}\n",
                c.timestamp.format("%Y-%m-%d %H:%M"),
                c.open,
                c.high,
                c.low,
                c.close,
                c.volume
            ));
        }

        if !closes.is_empty() {
            let rsi_series = rsi(&closes, 14);
            let sma20 = sma(&closes, 20);
            let sma50 = sma(&closes, 50);
            let macd_out = macd(&closes, 12, 26, 9);
            prompt.push_str("\nIndicators:\n");
            if let Some(v) = rsi_series[i] {
                prompt.push_str(&format!("RSI(14): {v:.2}\n"));
            }
            if let Some(v) = sma20[i] {
                prompt.push_str(&format!("SMA(20): {v:.4}\n"));
            }
            if let Some(v) = sma50[i] {
                prompt.push_str(&format!("SMA(50): {v:.4}\n"));
            }
            if let (Some(m), Some(s)) = (macd_out.macd[i], macd_out.signal[i]) {
                prompt.push_str(&format!("MACD: {m:.4} signal: {s:.4}\n"));
            }
        }

        prompt.push_str(
            "\nRespond with exactly one JSON object in a ```json code block with these fields:\n\
             signal_type (\"BUY\", \"SELL\" or \"HOLD\"), confidence (0..1), entry_price,\n\
             stop_loss, take_profit. Use null for levels you cannot justify.\n",
        );
        prompt
    }

    /// Parse and validate the model's answer; anything unusable is an empty
    /// list, never an error.
    fn signal_from_response(&self, market: &MarketView<'_>, text: &str) -> Vec<Signal> {
        let Some(raw) = extract_signal_json(text) else {
            warn!(strategy = Self::NAME, "no signal JSON in llm response");
            return Vec::new();
        };
        let parsed: ParsedAiSignal = match serde_json::from_str(&raw) {
            Ok(p) => p,
            Err(e) => {
                warn!(strategy = Self::NAME, error = %e, "llm signal JSON failed validation");
                return Vec::new();
            }
        };

        let signal_type = match parsed.signal_type.to_uppercase().as_str() {
            "BUY" => SignalType::Buy,
            "SELL" => SignalType::Sell,
            "HOLD" => {
                debug!(strategy = Self::NAME, "model answered HOLD");
                return Vec::new();
            }
            other => {
                warn!(strategy = Self::NAME, signal_type = other, "unknown signal type");
                return Vec::new();
            }
        };

        let Some(current_price) = market.last_close() else {
            return Vec::new();
        };
        let confidence = match parsed.confidence {
            Some(c) if (0.0..=1.0).contains(&c) => c,
            _ => 0.5,
        };
        let entry = parsed.entry_price.unwrap_or(current_price);

        let mut signal = Signal::new(
            market.symbol,
            signal_type,
            entry,
            Self::NAME,
            confidence,
            market.interval,
        );
        signal.stop_loss = parsed.stop_loss;
        signal.take_profit = parsed.take_profit;

        match signal.validate() {
            Ok(()) => vec![signal],
            Err(e) => {
                warn!(strategy = Self::NAME, error = %e, "llm signal rejected");
                Vec::new()
            }
        }
    }
}

/// Pull the signal JSON out of a model response: a fenced ```json block
/// first, then any bare object mentioning `signal_type`.
fn extract_signal_json(text: &str) -> Option<String> {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        if let Some(end) = rest.find("```") {
            let block = rest[..end].trim();
            if block.starts_with('{') {
                return Some(block.to_string());
            }
        }
    }

    // fallback: the innermost flat object carrying a signal_type key
    let key_pos = text.find("\"signal_type\"")?;
    let open = text[..key_pos].rfind('{')?;
    let close = text[key_pos..].find('}')? + key_pos;
    Some(text[open..=close].to_string())
}
