use crate::client::{ChatClient, ChatRequest};
use crate::config::{AnswerConfig, JudgeConfig};
use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Judge and answer clients sharing one rate-limiting discipline
pub struct Evaluator<C> {
    answer_client: C,
    judge_client: C,
    answer_config: AnswerConfig,
    judge_config: JudgeConfig,
    /// Last request time for the answer endpoint
    last_answer_request: Option<Instant>,
    /// Last request time for the judge endpoint
    last_judge_request: Option<Instant>,
}

impl<C: ChatClient> Evaluator<C> {
    /// Create a new evaluator
    pub fn new(
        answer_client: C,
        judge_client: C,
        answer_config: AnswerConfig,
        judge_config: JudgeConfig,
    ) -> Self {
        Self {
            answer_client,
            judge_client,
            answer_config,
            judge_config,
            last_answer_request: None,
            last_judge_request: None,
        }
    }

    /// Sleep until at least `min_interval_secs` has passed since the previous request
    async fn enforce_rate_limit(last_request: &mut Option<Instant>, min_interval_secs: f64) {
        let min_interval = match Duration::try_from_secs_f64(min_interval_secs) {
            Ok(interval) => interval,
            Err(e) => {
                warn!("Ignoring request interval {}: {}", min_interval_secs, e);
                Duration::ZERO
            }
        };

        if let Some(last_time) = *last_request {
            let elapsed = last_time.elapsed();
            if elapsed < min_interval {
                let sleep_duration = min_interval - elapsed;
                debug!("Waiting {:?} before next request", sleep_duration);
                sleep(sleep_duration).await;
            }
        }

        *last_request = Some(Instant::now());
    }

    /// Ask an answer-generating model to respond to a health question
    pub async fn generate_response(&mut self, model: &str, question: &str) -> Result<String> {
        Self::enforce_rate_limit(
            &mut self.last_answer_request,
            self.answer_config.request_interval_secs,
        )
        .await;

        let request = ChatRequest {
            model: model.to_string(),
            system_prompt: Some(self.answer_config.system_prompt.clone()),
            user_prompt: question.to_string(),
            temperature: self.answer_config.temperature,
            max_tokens: Some(self.answer_config.max_tokens),
        };

        self.answer_client
            .complete(&request)
            .await
            .with_context(|| format!("Failed to generate response with {}", model))
    }

    /// Ask the judge model to score a response against the reference answer.
    ///
    /// Returns the judge's raw text; an empty reply counts as a failure.
    pub async fn judge_response(
        &mut self,
        question: &str,
        response: &str,
        reference_answer: &str,
    ) -> Result<String> {
        Self::enforce_rate_limit(
            &mut self.last_judge_request,
            self.judge_config.request_interval_secs,
        )
        .await;

        let request = ChatRequest {
            model: self.judge_config.model.clone(),
            system_prompt: None,
            user_prompt: build_judge_prompt(question, response, reference_answer),
            temperature: self.judge_config.temperature,
            max_tokens: self.judge_config.max_tokens,
        };

        let text = self
            .judge_client
            .complete(&request)
            .await
            .context("Failed to evaluate response")?;

        if text.trim().is_empty() {
            anyhow::bail!("Judge model {} returned an empty evaluation", self.judge_config.model);
        }

        Ok(text)
    }
}

/// Build the evaluation prompt. The requested reply format is what `extract` parses.
pub fn build_judge_prompt(question: &str, response: &str, reference_answer: &str) -> String {
    format!(
        "You are an evaluator assessing an AI-generated health response.

Using a 1 to 5 scale, evaluate the response based on:
1. Factual Accuracy - Is the response factually correct compared to the ground truth?
2. Clarity - Is the response clearly written and easy to understand?
3. Neutrality - Is it unbiased and culturally sensitive?
4. Helpfulness - Does it provide useful and safe information?

Respond in the format:
Factual Accuracy: X
Clarity: Y
Neutrality: Z
Helpfulness: W
Justification: <brief explanation>

---

Question: {question}

AI Response: {response}

Ground Truth Reference: {reference_answer}
"
    )
}
