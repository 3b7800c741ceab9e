// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LLM-based finding triage over a local Ollama instance.
//!
//! Best-effort by contract: any transport, parse, or timeout failure
//! returns the finding's own values with `false_positive = false`. Model
//! selection follows a memory ladder and switching is idempotent under
//! concurrent requests.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use thiserror::Error;

use dn_core::{Finding, Severity};

/// Review produced for one finding.
#[derive(Debug, Clone, PartialEq)]
pub struct TriageReview {
    pub false_positive: bool,
    pub adjusted_severity: Severity,
    pub rationale: String,
    pub remediation: String,
    pub model_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum TriageError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model endpoint returned {0}")]
    Status(u16),
    #[error("unparseable model output")]
    Parse,
}

/// Triage adapter configuration.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    pub base_url: String,
    /// Unload the model after this long without a successful generation.
    pub idle_timeout: Duration,
    pub temperature: f64,
    /// `(model, required free MB)` pairs, largest model first.
    pub ladder: Vec<(String, u64)>,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            idle_timeout: Duration::from_secs(300),
            temperature: 0.3,
            ladder: vec![
                ("llama3.1:8b".to_string(), 6000),
                ("gemma3:4b".to_string(), 3500),
                ("gemma3:1b".to_string(), 1500),
            ],
        }
    }
}

/// Ollama-backed triage with memory-aware model selection.
pub struct TriageAdapter {
    config: TriageConfig,
    http: reqwest::Client,
    /// Loaded-model slot, shared with the idle-unload timer task.
    loaded: Arc<Mutex<Option<String>>>,
    /// Serializes model switching so concurrent requests load once.
    switch_guard: tokio::sync::Mutex<()>,
    /// Coalesced idle-unload timer; rescheduled on every generation.
    unload_timer: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl TriageAdapter {
    pub fn new(config: TriageConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            loaded: Arc::new(Mutex::new(None)),
            switch_guard: tokio::sync::Mutex::new(()),
            unload_timer: Mutex::new(None),
        }
    }

    /// Model currently loaded, if any.
    pub fn loaded_model(&self) -> Option<String> {
        self.loaded.lock().clone()
    }

    /// Largest ladder model that fits the currently free memory.
    pub fn select_model(&self) -> String {
        select_from_ladder(free_memory_mb(), &self.config.ladder)
    }

    /// Switch to the optimal model when it differs from the loaded one.
    ///
    /// Idempotent under concurrency: the switch guard makes late callers
    /// observe the already-loaded model and return without a second load.
    pub async fn auto_scale(&self) -> Result<String, TriageError> {
        let optimal = self.select_model();
        if self.loaded_model().as_deref() == Some(optimal.as_str()) {
            return Ok(optimal);
        }

        let _switching = self.switch_guard.lock().await;
        if self.loaded_model().as_deref() == Some(optimal.as_str()) {
            return Ok(optimal);
        }

        tracing::info!(model = %optimal, "loading triage model");
        // Pull is advisory; the model may already be present.
        let _ = self
            .http
            .post(format!("{}/api/pull", self.config.base_url))
            .json(&json!({"name": optimal, "stream": false}))
            .send()
            .await;

        let response = self
            .http
            .post(format!("{}/api/generate", self.config.base_url))
            .json(&json!({"model": optimal, "prompt": "Hello", "stream": false}))
            .timeout(Duration::from_secs(300))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(TriageError::Status(response.status().as_u16()));
        }

        *self.loaded.lock() = Some(optimal.clone());
        Ok(optimal)
    }

    /// Drop the loaded-model slot; Ollama frees memory on its own idle path.
    pub fn unload(&self) {
        if self.loaded.lock().take().is_some() {
            tracing::info!("triage model unloaded");
        }
    }

    /// Generate text with the current (auto-scaled) model.
    pub async fn generate(&self, prompt: &str) -> Result<String, TriageError> {
        let model = self.auto_scale().await?;

        // Any in-flight idle unload is superseded by this generation.
        if let Some(timer) = self.unload_timer.lock().take() {
            timer.abort();
        }

        let response = self
            .http
            .post(format!("{}/api/generate", self.config.base_url))
            .json(&json!({
                "model": model,
                "prompt": prompt,
                "stream": false,
                "options": {"temperature": self.config.temperature},
            }))
            .timeout(Duration::from_secs(300))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(TriageError::Status(response.status().as_u16()));
        }
        let body: Value = response.json().await?;
        let text = body
            .get("response")
            .and_then(|r| r.as_str())
            .ok_or(TriageError::Parse)?
            .to_string();

        self.schedule_unload();
        Ok(text)
    }

    /// Review a finding; falls back to the input verbatim on any failure.
    pub async fn review(&self, finding: &Finding) -> TriageReview {
        let fallback = TriageReview {
            false_positive: false,
            adjusted_severity: finding.severity,
            rationale: String::new(),
            remediation: String::new(),
            model_id: self.loaded_model(),
        };

        let prompt = review_prompt(finding);
        let response = match self.generate(&prompt).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(%error, "triage unavailable, keeping finding as-is");
                return fallback;
            }
        };

        match parse_review(&response, finding.severity) {
            Some(mut review) => {
                review.model_id = self.loaded_model();
                review
            }
            None => {
                tracing::warn!("triage output unparseable, keeping finding as-is");
                fallback
            }
        }
    }

    fn schedule_unload(&self) {
        let slot = Arc::clone(&self.loaded);
        let idle = self.config.idle_timeout;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            if slot.lock().take().is_some() {
                tracing::info!("triage model unloaded after idle timeout");
            }
        });
        if let Some(previous) = self.unload_timer.lock().replace(handle) {
            previous.abort();
        }
    }
}

fn review_prompt(finding: &Finding) -> String {
    format!(
        "Analyze this security finding:\n\n\
         Title: {}\n\
         Tool: {}\n\
         Severity: {}\n\
         URL: {}\n\
         Evidence: {}\n\n\
         Tasks:\n\
         1. Is this likely a false positive? (yes/no)\n\
         2. Adjusted severity (critical/high/medium/low/info)\n\
         3. Brief rationale (2-3 sentences)\n\
         4. Remediation advice\n\n\
         Respond with a JSON object with keys false_positive, \
         adjusted_severity, rationale, remediation.",
        finding.title,
        finding.tool_source,
        finding.severity,
        finding.affected_url.as_deref().unwrap_or("n/a"),
        finding.evidence.as_deref().unwrap_or("n/a"),
    )
}

/// Parse the model's JSON (possibly fenced in markdown) into a review.
pub(crate) fn parse_review(response: &str, input_severity: Severity) -> Option<TriageReview> {
    let json_str = strip_fences(response);
    let value: Value = serde_json::from_str(json_str.trim()).ok()?;

    let false_positive = match value.get("false_positive") {
        Some(Value::Bool(fp)) => *fp,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("yes") || s.eq_ignore_ascii_case("true"),
        _ => false,
    };
    let adjusted_severity = value
        .get("adjusted_severity")
        .and_then(|s| s.as_str())
        .and_then(|s| s.parse::<Severity>().ok())
        .unwrap_or(input_severity);

    Some(TriageReview {
        false_positive,
        adjusted_severity,
        rationale: value
            .get("rationale")
            .and_then(|r| r.as_str())
            .unwrap_or_default()
            .to_string(),
        remediation: value
            .get("remediation")
            .and_then(|r| r.as_str())
            .unwrap_or_default()
            .to_string(),
        model_id: None,
    })
}

/// Models wrap JSON in markdown fences more often than not.
fn strip_fences(response: &str) -> &str {
    if let Some(start) = response.find("```json") {
        let rest = &response[start + 7..];
        return rest.split("```").next().unwrap_or(rest);
    }
    if let Some(start) = response.find("```") {
        let rest = &response[start + 3..];
        return rest.split("```").next().unwrap_or(rest);
    }
    response
}

/// Largest model whose memory requirement fits; smallest as last resort.
pub(crate) fn select_from_ladder(free_mb: u64, ladder: &[(String, u64)]) -> String {
    ladder
        .iter()
        .find(|(_, required)| free_mb >= *required)
        .or_else(|| ladder.last())
        .map(|(model, _)| model.clone())
        .unwrap_or_default()
}

fn free_memory_mb() -> u64 {
    let mut system = sysinfo::System::new();
    system.refresh_memory();
    system.available_memory() / (1024 * 1024)
}

#[cfg(test)]
#[path = "triage_tests.rs"]
mod tests;
