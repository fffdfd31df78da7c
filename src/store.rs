//! JSON persistence for questions and evaluation records.
//!
//! Every write serializes the whole collection to a temporary file in the
//! target directory and renames it into place, so a reader sees either the
//! previous or the new collection, never a half-written one.

use crate::models::{EvaluationRecord, LegacyEvaluation, ModelEvaluation, Question};
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON: {}", path.display()))
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut json_content =
        serde_json::to_string_pretty(value).context("Failed to serialize collection to JSON")?;
    json_content.push('\n');

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    temp.write_all(json_content.as_bytes())
        .with_context(|| format!("Failed to write temporary file for {}", path.display()))?;
    temp.as_file()
        .sync_all()
        .with_context(|| format!("Failed to flush temporary file for {}", path.display()))?;
    temp.persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    debug!("Wrote {}", path.display());
    Ok(())
}

/// The study's questions collection
#[derive(Debug)]
pub struct QuestionSet {
    path: PathBuf,
    pub questions: Vec<Question>,
}

impl QuestionSet {
    /// Load the questions file; it must exist
    pub fn load(path: &Path) -> Result<Self> {
        let questions: Vec<Question> = read_json(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            questions,
        })
    }

    /// Write the full collection back, preserving fields this tool does not use
    pub fn save(&self) -> Result<()> {
        write_json_atomic(&self.path, &self.questions)
    }
}

/// Canonical evaluation records keyed by question id
#[derive(Debug)]
pub struct EvaluationStore {
    path: PathBuf,
    records: BTreeMap<u64, EvaluationRecord>,
}

impl EvaluationStore {
    /// Load the store; a missing file is an empty store
    pub fn load(path: &Path) -> Result<Self> {
        let mut store = Self {
            path: path.to_path_buf(),
            records: BTreeMap::new(),
        };

        if !path.exists() {
            debug!("No evaluation store at {}, starting empty", path.display());
            return Ok(store);
        }

        let records: Vec<EvaluationRecord> = read_json(path)?;
        for record in records {
            if store.records.contains_key(&record.id) {
                anyhow::bail!(
                    "Duplicate record id {} in {}",
                    record.id,
                    path.display()
                );
            }
            store.records.insert(record.id, record);
        }

        Ok(store)
    }

    /// Write all records, ordered by id
    pub fn save(&self) -> Result<()> {
        let records: Vec<&EvaluationRecord> = self.records.values().collect();
        write_json_atomic(&self.path, &records)
    }

    pub fn get(&self, id: u64) -> Option<&EvaluationRecord> {
        self.records.get(&id)
    }

    /// Stored evaluation for one (question, model) pair
    pub fn evaluation(&self, id: u64, model: &str) -> Option<&ModelEvaluation> {
        self.get(id)?.evaluations.get(model)
    }

    pub fn records(&self) -> impl Iterator<Item = &EvaluationRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Make sure a record exists for `question` and carries its current text.
    ///
    /// Returns `true` if the record was created or changed.
    pub fn ensure_record(&mut self, question: &Question) -> bool {
        match self.records.get_mut(&question.id) {
            Some(record) => {
                let reference = question.reference_text();
                let changed = record.question != question.text || record.reference_answer != reference;
                if changed {
                    record.question = question.text.clone();
                    record.reference_answer = reference;
                }
                changed
            }
            None => {
                self.records
                    .insert(question.id, EvaluationRecord::seeded(question));
                true
            }
        }
    }

    /// Insert or replace the evaluation of `model` in an existing record
    pub fn upsert_evaluation(&mut self, id: u64, model: &str, evaluation: ModelEvaluation) -> Result<()> {
        let record = self
            .records
            .get_mut(&id)
            .with_context(|| format!("No evaluation record for question {}", id))?;
        record.evaluations.insert(model.to_string(), evaluation);
        Ok(())
    }
}

/// Judge texts from the earlier single-response evaluation file
#[derive(Debug, Default)]
pub struct LegacyEvaluations {
    by_id: HashMap<u64, LegacyEvaluation>,
}

impl LegacyEvaluations {
    /// Load legacy evaluations; a missing file yields none
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No legacy evaluations at {}", path.display());
            return Ok(Self::default());
        }

        let entries: Vec<LegacyEvaluation> = read_json(path)?;
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: Vec<LegacyEvaluation>) -> Self {
        let by_id = entries.into_iter().map(|entry| (entry.id, entry)).collect();
        Self { by_id }
    }

    /// Raw judge text for question `id` if it was produced for exactly `response`
    pub fn reusable(&self, id: u64, response: &str) -> Option<&str> {
        let entry = self.by_id.get(&id)?;
        if entry.gpt_response.as_deref() != Some(response) {
            return None;
        }
        entry
            .evaluation
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Scores;
    use serde_json::json;
    use tempfile::tempdir;

    fn question(id: u64, text: &str, answer: Option<&str>) -> Question {
        serde_json::from_value(json!({
            "id": id,
            "question": text,
            "answer": answer,
        }))
        .unwrap()
    }

    fn evaluation(response: &str) -> ModelEvaluation {
        ModelEvaluation {
            scores: Scores {
                factual_accuracy: Some(4),
                clarity: Some(4),
                neutrality: Some(5),
                helpfulness: None,
            },
            justification: "ok".to_string(),
            response: response.to_string(),
        }
    }

    #[test]
    fn test_missing_store_is_empty() {
        let dir = tempdir().unwrap();
        let store = EvaluationStore::load(&dir.path().join("evaluations.json")).unwrap();
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_store_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("evaluations.json");

        let mut store = EvaluationStore::load(&path).unwrap();
        assert!(store.ensure_record(&question(2, "Second?", Some("B"))));
        assert!(store.ensure_record(&question(1, "First?", Some("A"))));
        store.upsert_evaluation(1, "gpt-4", evaluation("Yes.")).unwrap();
        store.save().unwrap();

        let reloaded = EvaluationStore::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.evaluation(1, "gpt-4").unwrap().response, "Yes.");
        assert!(reloaded.evaluation(2, "gpt-4").is_none());

        let ids: Vec<u64> = reloaded.records().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[0]["ground_truth"], json!("A"));
        assert_eq!(raw[0]["evaluations"]["gpt-4"]["helpfulness"], json!(null));
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("evaluations.json");
        let mut store = EvaluationStore::load(&path).unwrap();
        store.ensure_record(&question(1, "Q?", Some("A")));
        store.save().unwrap();
        store.save().unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("evaluations.json");
        let record = json!({"id": 7, "question": "Q", "ground_truth": "A", "evaluations": {}});
        std::fs::write(&path, json!([record, record]).to_string()).unwrap();

        let result = EvaluationStore::load(&path);
        assert!(result.unwrap_err().to_string().contains("Duplicate record id 7"));
    }

    #[test]
    fn test_corrupt_store_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("evaluations.json");
        std::fs::write(&path, "[{\"id\": ").unwrap();

        let result = EvaluationStore::load(&path);
        assert!(result.unwrap_err().to_string().contains("Failed to parse JSON"));
    }

    #[test]
    fn test_ensure_record_is_stable() {
        let dir = tempdir().unwrap();
        let mut store = EvaluationStore::load(&dir.path().join("e.json")).unwrap();
        let q = question(1, "Q?", Some("A"));

        assert!(store.ensure_record(&q));
        assert!(!store.ensure_record(&q));
        assert!(store.ensure_record(&question(1, "Q?", Some("Revised A"))));
        assert_eq!(store.get(1).unwrap().reference_answer, "Revised A");
    }

    #[test]
    fn test_upsert_without_record_is_error() {
        let dir = tempdir().unwrap();
        let mut store = EvaluationStore::load(&dir.path().join("e.json")).unwrap();
        assert!(store.upsert_evaluation(9, "gpt-4", evaluation("x")).is_err());
    }

    #[test]
    fn test_question_set_round_trip_keeps_extra_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("questions.json");
        std::fs::write(
            &path,
            json!([{
                "id": 1,
                "question": "Is sleep important?",
                "answer": "Yes.",
                "response": "legacy single response",
                "source": "CDC",
                "link": "https://www.cdc.gov/sleep"
            }])
            .to_string(),
        )
        .unwrap();

        let mut set = QuestionSet::load(&path).unwrap();
        set.questions[0].set_response("gpt-4", "Very.".to_string());
        set.save().unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[0]["source"], json!("CDC"));
        assert_eq!(raw[0]["link"], json!("https://www.cdc.gov/sleep"));
        assert_eq!(raw[0]["response"], json!("legacy single response"));
        assert_eq!(raw[0]["aiResponse"]["gpt-4"], json!("Very."));
    }

    #[test]
    fn test_missing_questions_file_is_error() {
        let dir = tempdir().unwrap();
        assert!(QuestionSet::load(&dir.path().join("questions.json")).is_err());
    }

    #[test]
    fn test_legacy_reuse_requires_identical_response() {
        let legacy = LegacyEvaluations::from_entries(vec![
            LegacyEvaluation {
                id: 1,
                gpt_response: Some("Drink water.".to_string()),
                evaluation: Some("Accuracy: 5".to_string()),
            },
            LegacyEvaluation {
                id: 2,
                gpt_response: Some("Rest.".to_string()),
                evaluation: Some("  ".to_string()),
            },
        ]);

        assert_eq!(legacy.len(), 2);
        assert_eq!(legacy.reusable(1, "Drink water."), Some("Accuracy: 5"));
        assert_eq!(legacy.reusable(1, "Drink water!"), None);
        assert_eq!(legacy.reusable(2, "Rest."), None);
        assert_eq!(legacy.reusable(3, "anything"), None);
    }

    #[test]
    fn test_legacy_load_ignores_extra_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("evaluations.json");
        std::fs::write(
            &path,
            json!([{
                "id": 4,
                "question": "Q",
                "gpt_response": "R",
                "ground_truth": "A",
                "evaluation": "Clarity: 3"
            }])
            .to_string(),
        )
        .unwrap();

        let legacy = LegacyEvaluations::load(&path).unwrap();
        assert_eq!(legacy.reusable(4, "R"), Some("Clarity: 3"));
        assert_eq!(LegacyEvaluations::load(&dir.path().join("none.json")).unwrap().len(), 0);
    }
}
