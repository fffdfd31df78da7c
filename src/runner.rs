use crate::client::ChatClient;
use crate::config::OutOfRangePolicy;
use crate::evaluation::Evaluator;
use crate::extract::extract;
use crate::models::{Criterion, ModelEvaluation, Question, Scores};
use crate::store::{EvaluationStore, LegacyEvaluations, QuestionSet};
use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Valid range of a criterion score
pub const SCORE_RANGE: std::ops::RangeInclusive<u32> = 1..=5;

/// Why a (question, model) pair was not attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingResponse,
    MissingReference,
}

/// A pair that was skipped or failed during a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairIssue {
    pub question_id: u64,
    pub model: String,
    pub detail: String,
}

/// Outcome counts and problems of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    /// Pairs that got a new result from an external call
    pub completed: usize,
    /// Pairs satisfied by earlier work without an external call
    pub reused: usize,
    pub skipped: Vec<PairIssue>,
    pub failed: Vec<PairIssue>,
}

impl RunSummary {
    fn skip(&mut self, question_id: u64, model: &str, reason: SkipReason) {
        let detail = match reason {
            SkipReason::MissingResponse => "missing response",
            SkipReason::MissingReference => "missing reference answer",
        };
        info!("Skipping Q{} / {}: {}", question_id, model, detail);
        self.skipped.push(PairIssue {
            question_id,
            model: model.to_string(),
            detail: detail.to_string(),
        });
    }

    fn fail(&mut self, question_id: u64, model: &str, error: &anyhow::Error) {
        warn!("Q{} / {} failed: {:#}", question_id, model, error);
        self.failed.push(PairIssue {
            question_id,
            model: model.to_string(),
            detail: format!("{:#}", error),
        });
    }
}

/// Apply the configured out-of-range policy to freshly extracted scores
pub fn apply_range_policy(mut scores: Scores, policy: OutOfRangePolicy) -> Scores {
    if policy == OutOfRangePolicy::Discard {
        for criterion in Criterion::ALL {
            if let Some(value) = scores.get(criterion).filter(|v| !SCORE_RANGE.contains(v)) {
                warn!("Discarding out-of-range {} score {}", criterion, value);
                scores.set(criterion, None);
            }
        }
    }
    scores
}

/// Main runner that orchestrates response generation and evaluation merging
pub struct Runner<C> {
    evaluator: Evaluator<C>,
    out_of_range: OutOfRangePolicy,
}

impl<C: ChatClient> Runner<C> {
    /// Create a new runner around an evaluator
    pub fn new(evaluator: Evaluator<C>, out_of_range: OutOfRangePolicy) -> Self {
        Self {
            evaluator,
            out_of_range,
        }
    }

    /// Fill in missing candidate responses for `models`.
    ///
    /// Existing responses are never regenerated. The questions file is
    /// rewritten after every new response.
    pub async fn generate(&mut self, questions: &mut QuestionSet, models: &[String]) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let total_questions = questions.questions.len();

        for index in 0..total_questions {
            let (question_id, question_text) = {
                let question = &questions.questions[index];
                (question.id, question.text.clone())
            };
            info!("Processing question {}/{} (Q{})", index + 1, total_questions, question_id);

            for model in models {
                if questions.questions[index].response(model).is_some() {
                    debug!("Q{} already has a response from {}", question_id, model);
                    summary.reused += 1;
                    continue;
                }

                info!("  → Generating response with {}", model);
                match self.evaluator.generate_response(model, &question_text).await {
                    Ok(text) => {
                        questions.questions[index].set_response(model, text);
                        questions.save()?;
                        summary.completed += 1;
                    }
                    Err(e) => summary.fail(question_id, model, &e),
                }
            }
        }

        Ok(summary)
    }

    /// Bring the evaluation store up to date with every question's responses.
    ///
    /// A pair is only sent to the judge if the store has no evaluation for it
    /// or the stored response differs from the current one. Each new
    /// evaluation is persisted immediately; judge failures leave the pair
    /// unevaluated and processing continues.
    pub async fn evaluate(
        &mut self,
        questions: &[Question],
        store: &mut EvaluationStore,
        legacy: &LegacyEvaluations,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let total_questions = questions.len();

        for (index, question) in questions.iter().enumerate() {
            info!(
                "Evaluating question {}/{} (Q{})",
                index + 1,
                total_questions,
                question.id
            );
            let mut dirty = store.ensure_record(question);

            for (model, response) in question.responses() {
                let Some(response) = response else {
                    summary.skip(question.id, model, SkipReason::MissingResponse);
                    continue;
                };
                let Some(reference) = question.reference() else {
                    summary.skip(question.id, model, SkipReason::MissingReference);
                    continue;
                };

                let unchanged = store
                    .evaluation(question.id, model)
                    .is_some_and(|existing| existing.response == response);
                if unchanged {
                    debug!("  Reusing stored evaluation for {}", model);
                    summary.reused += 1;
                    continue;
                }

                if let Some(judge_text) = legacy.reusable(question.id, response) {
                    debug!("  Reusing legacy evaluation for {}", model);
                    let evaluation = self.to_model_evaluation(judge_text, response);
                    store.upsert_evaluation(question.id, model, evaluation)?;
                    store.save()?;
                    dirty = false;
                    summary.reused += 1;
                    continue;
                }

                info!("  → Evaluating {}", model);
                match self
                    .evaluator
                    .judge_response(&question.text, response, reference)
                    .await
                {
                    Ok(judge_text) => {
                        let evaluation = self.to_model_evaluation(&judge_text, response);
                        store.upsert_evaluation(question.id, model, evaluation)?;
                        store.save()?;
                        dirty = false;
                        summary.completed += 1;
                    }
                    Err(e) => summary.fail(question.id, model, &e),
                }
            }

            if dirty {
                store.save()?;
            }
        }

        Ok(summary)
    }

    fn to_model_evaluation(&self, judge_text: &str, response: &str) -> ModelEvaluation {
        let extraction = extract(judge_text);
        ModelEvaluation {
            scores: apply_range_policy(extraction.scores, self.out_of_range),
            justification: extraction.justification,
            response: response.to_string(),
        }
    }
}
