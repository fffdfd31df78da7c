//! Aggregate statistics over a finished evaluation store.
//!
//! Absent scores are missing data: they are counted separately and never
//! enter a mean, median or mode.

use crate::category::{Category, categorize};
use crate::models::{Criterion, EvaluationRecord};
use crate::runner::SCORE_RANGE;
use serde::Serialize;
use std::collections::BTreeMap;

/// Statistics for one criterion of one model
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CriterionStats {
    /// Number of present scores
    pub count: usize,
    /// Number of evaluations without a parseable score
    pub missing: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    /// Most frequent score; the lowest value wins ties
    pub mode: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelSummary {
    pub evaluations: usize,
    pub criteria: BTreeMap<Criterion, CriterionStats>,
    /// Mean of all present scores across criteria
    pub overall_mean: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategorySummary {
    pub questions: usize,
    pub mean: Option<f64>,
}

/// A response whose factual accuracy is at or below the threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LowAccuracyCase {
    pub question_id: u64,
    pub model: String,
    pub factual_accuracy: u32,
}

/// A stored score outside the 1..=5 scale
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutOfRangeScore {
    pub question_id: u64,
    pub model: String,
    pub criterion: Criterion,
    pub value: u32,
}

/// Aggregated view of the evaluation store
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub total_questions: usize,
    pub total_evaluations: usize,
    pub models: BTreeMap<String, ModelSummary>,
    /// Models ordered by overall mean, best first
    pub ranking: Vec<(String, f64)>,
    pub categories: BTreeMap<Category, CategorySummary>,
    pub low_accuracy_threshold: u32,
    pub low_accuracy: Vec<LowAccuracyCase>,
    pub out_of_range: Vec<OutOfRangeScore>,
}

/// Build the report from evaluation records
pub fn build_report<'a, I>(records: I, low_accuracy_threshold: u32) -> Report
where
    I: IntoIterator<Item = &'a EvaluationRecord>,
{
    let mut report = Report {
        low_accuracy_threshold,
        ..Report::default()
    };
    let mut model_scores: BTreeMap<&str, BTreeMap<Criterion, Vec<u32>>> = BTreeMap::new();
    let mut model_counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut category_scores: BTreeMap<Category, (usize, Vec<u32>)> = BTreeMap::new();

    for record in records {
        report.total_questions += 1;
        let category_entry = category_scores
            .entry(categorize(&record.question))
            .or_default();
        category_entry.0 += 1;

        for (model, evaluation) in &record.evaluations {
            report.total_evaluations += 1;
            *model_counts.entry(model.as_str()).or_default() += 1;
            let per_criterion = model_scores.entry(model.as_str()).or_default();

            for (criterion, value) in evaluation.scores.present() {
                per_criterion.entry(criterion).or_default().push(value);
                category_entry.1.push(value);

                if !SCORE_RANGE.contains(&value) {
                    report.out_of_range.push(OutOfRangeScore {
                        question_id: record.id,
                        model: model.clone(),
                        criterion,
                        value,
                    });
                }
            }

            if let Some(accuracy) = evaluation.scores.factual_accuracy {
                if accuracy <= low_accuracy_threshold {
                    report.low_accuracy.push(LowAccuracyCase {
                        question_id: record.id,
                        model: model.clone(),
                        factual_accuracy: accuracy,
                    });
                }
            }
        }
    }

    for (model, evaluations) in model_counts {
        let scores = model_scores.remove(model).unwrap_or_default();
        let mut summary = ModelSummary {
            evaluations,
            ..ModelSummary::default()
        };

        let mut all_scores = Vec::new();
        for criterion in Criterion::ALL {
            let values = scores.get(&criterion).map(Vec::as_slice).unwrap_or_default();
            all_scores.extend_from_slice(values);
            summary
                .criteria
                .insert(criterion, criterion_stats(values, evaluations));
        }
        summary.overall_mean = calculate_mean(&all_scores);

        if let Some(mean) = summary.overall_mean {
            report.ranking.push((model.to_string(), mean));
        }
        report.models.insert(model.to_string(), summary);
    }

    report
        .ranking
        .sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    report.categories = category_scores
        .into_iter()
        .map(|(category, (questions, scores))| {
            let summary = CategorySummary {
                questions,
                mean: calculate_mean(&scores),
            };
            (category, summary)
        })
        .collect();

    report
}

fn criterion_stats(scores: &[u32], evaluations: usize) -> CriterionStats {
    CriterionStats {
        count: scores.len(),
        missing: evaluations - scores.len(),
        mean: calculate_mean(scores),
        median: calculate_median(scores),
        mode: calculate_mode(scores),
    }
}

/// Calculate mean of scores
fn calculate_mean(scores: &[u32]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let sum: u64 = scores.iter().map(|&s| u64::from(s)).sum();
    Some(sum as f64 / scores.len() as f64)
}

/// Calculate median of scores
fn calculate_median(scores: &[u32]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let mut sorted_scores = scores.to_vec();
    sorted_scores.sort_unstable();

    let mid = sorted_scores.len() / 2;
    if sorted_scores.len() % 2 == 0 {
        Some((f64::from(sorted_scores[mid - 1]) + f64::from(sorted_scores[mid])) / 2.0)
    } else {
        Some(f64::from(sorted_scores[mid]))
    }
}

/// Calculate mode of scores (most frequent value)
fn calculate_mode(scores: &[u32]) -> Option<u32> {
    let mut frequency: BTreeMap<u32, usize> = BTreeMap::new();
    for &score in scores {
        *frequency.entry(score).or_insert(0) += 1;
    }

    let mut best: Option<(u32, usize)> = None;
    for (score, count) in frequency {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((score, count));
        }
    }
    best.map(|(score, _)| score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModelEvaluation, Scores};

    fn evaluation(accuracy: Option<u32>, clarity: Option<u32>, neutrality: Option<u32>, helpfulness: Option<u32>) -> ModelEvaluation {
        ModelEvaluation {
            scores: Scores {
                factual_accuracy: accuracy,
                clarity,
                neutrality,
                helpfulness,
            },
            justification: String::new(),
            response: "response".to_string(),
        }
    }

    fn record(id: u64, question: &str, evaluations: Vec<(&str, ModelEvaluation)>) -> EvaluationRecord {
        EvaluationRecord {
            id,
            question: question.to_string(),
            reference_answer: "reference".to_string(),
            evaluations: evaluations
                .into_iter()
                .map(|(model, evaluation)| (model.to_string(), evaluation))
                .collect(),
        }
    }

    fn sample_records() -> Vec<EvaluationRecord> {
        vec![
            record(
                1,
                "Is it safe to get an MRI while pregnant?",
                vec![
                    ("gpt-4", evaluation(Some(5), Some(5), Some(5), Some(5))),
                    ("gpt-3.5-turbo", evaluation(Some(2), Some(4), Some(4), None)),
                ],
            ),
            record(
                2,
                "How much water should I drink?",
                vec![
                    ("gpt-4", evaluation(Some(4), Some(4), Some(5), Some(4))),
                    ("gpt-3.5-turbo", evaluation(Some(4), None, Some(4), Some(3))),
                ],
            ),
            record(3, "Why do I sneeze?", vec![]),
        ]
    }

    #[test]
    fn test_report_totals_and_ranking() {
        let records = sample_records();
        let report = build_report(&records, 2);

        assert_eq!(report.total_questions, 3);
        assert_eq!(report.total_evaluations, 4);
        assert_eq!(report.ranking[0].0, "gpt-4");
        assert!((report.ranking[0].1 - 37.0 / 8.0).abs() < 1e-9);
        assert_eq!(report.ranking[1].0, "gpt-3.5-turbo");
        assert!((report.ranking[1].1 - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_absent_scores_are_excluded_not_zero() {
        let records = sample_records();
        let report = build_report(&records, 2);

        let turbo = &report.models["gpt-3.5-turbo"];
        let clarity = &turbo.criteria[&Criterion::Clarity];
        assert_eq!(clarity.count, 1);
        assert_eq!(clarity.missing, 1);
        assert_eq!(clarity.mean, Some(4.0));

        let helpfulness = &turbo.criteria[&Criterion::Helpfulness];
        assert_eq!(helpfulness.mean, Some(3.0));
        assert_eq!(helpfulness.missing, 1);
    }

    #[test]
    fn test_criterion_statistics() {
        let records = sample_records();
        let report = build_report(&records, 2);

        let accuracy = &report.models["gpt-4"].criteria[&Criterion::FactualAccuracy];
        assert_eq!(accuracy.count, 2);
        assert_eq!(accuracy.mean, Some(4.5));
        assert_eq!(accuracy.median, Some(4.5));
        assert_eq!(accuracy.mode, Some(4));
    }

    #[test]
    fn test_low_accuracy_cases() {
        let records = sample_records();
        let report = build_report(&records, 2);

        assert_eq!(
            report.low_accuracy,
            vec![LowAccuracyCase {
                question_id: 1,
                model: "gpt-3.5-turbo".to_string(),
                factual_accuracy: 2,
            }]
        );
        assert!(build_report(&records, 1).low_accuracy.is_empty());
    }

    #[test]
    fn test_categories() {
        let records = sample_records();
        let report = build_report(&records, 2);

        let pregnancy = &report.categories[&Category::PregnancyReproductive];
        assert_eq!(pregnancy.questions, 1);
        assert!((pregnancy.mean.unwrap() - 30.0 / 7.0).abs() < 1e-9);

        let general = &report.categories[&Category::GeneralHealth];
        assert_eq!(general.questions, 1);
        assert_eq!(general.mean, None);
    }

    #[test]
    fn test_out_of_range_scores_are_flagged() {
        let records = vec![record(
            1,
            "Q",
            vec![("gpt-4", evaluation(Some(7), Some(0), Some(3), Some(5)))],
        )];
        let report = build_report(&records, 2);

        assert_eq!(report.out_of_range.len(), 2);
        assert_eq!(report.out_of_range[0].criterion, Criterion::FactualAccuracy);
        assert_eq!(report.out_of_range[0].value, 7);
        assert_eq!(report.out_of_range[1].criterion, Criterion::Clarity);
        assert!(report.low_accuracy.is_empty());
    }

    #[test]
    fn test_empty_store() {
        let report = build_report(&Vec::new(), 2);
        assert_eq!(report.total_questions, 0);
        assert!(report.models.is_empty());
        assert!(report.ranking.is_empty());
    }

    #[test]
    fn test_model_with_only_absent_scores() {
        let records = vec![record(1, "Q", vec![("gpt-4", evaluation(None, None, None, None))])];
        let report = build_report(&records, 2);

        let summary = &report.models["gpt-4"];
        assert_eq!(summary.evaluations, 1);
        assert_eq!(summary.overall_mean, None);
        assert_eq!(summary.criteria[&Criterion::Clarity].missing, 1);
        assert!(report.ranking.is_empty());
    }

    #[test]
    fn test_calculate_median_even_and_odd() {
        assert_eq!(calculate_median(&[3, 1, 2]), Some(2.0));
        assert_eq!(calculate_median(&[4, 1, 3, 2]), Some(2.5));
        assert_eq!(calculate_median(&[]), None);
    }

    #[test]
    fn test_calculate_mode_ties_pick_lowest() {
        assert_eq!(calculate_mode(&[5, 4, 4, 5, 3]), Some(4));
        assert_eq!(calculate_mode(&[2, 5, 5]), Some(5));
        assert_eq!(calculate_mode(&[]), None);
    }

    #[test]
    fn test_report_serializes_criterion_keys() {
        let records = sample_records();
        let value = serde_json::to_value(build_report(&records, 2)).unwrap();
        assert!(value["models"]["gpt-4"]["criteria"]["factual_accuracy"].is_object());
        assert!(value["categories"]["Nutrition/Lifestyle"].is_object());
    }
}
