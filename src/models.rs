use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// One of the four fixed evaluation dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    FactualAccuracy,
    Clarity,
    Neutrality,
    Helpfulness,
}

impl Criterion {
    pub const ALL: [Criterion; 4] = [
        Criterion::FactualAccuracy,
        Criterion::Clarity,
        Criterion::Neutrality,
        Criterion::Helpfulness,
    ];

    /// Field name used in persisted records
    pub fn key(self) -> &'static str {
        match self {
            Criterion::FactualAccuracy => "factual_accuracy",
            Criterion::Clarity => "clarity",
            Criterion::Neutrality => "neutrality",
            Criterion::Helpfulness => "helpfulness",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Scores for the four criteria. `None` means the judge text had no parseable value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    #[serde(default)]
    pub factual_accuracy: Option<u32>,
    #[serde(default)]
    pub clarity: Option<u32>,
    #[serde(default)]
    pub neutrality: Option<u32>,
    #[serde(default)]
    pub helpfulness: Option<u32>,
}

impl Scores {
    pub fn get(&self, criterion: Criterion) -> Option<u32> {
        match criterion {
            Criterion::FactualAccuracy => self.factual_accuracy,
            Criterion::Clarity => self.clarity,
            Criterion::Neutrality => self.neutrality,
            Criterion::Helpfulness => self.helpfulness,
        }
    }

    pub fn set(&mut self, criterion: Criterion, value: Option<u32>) {
        let slot = match criterion {
            Criterion::FactualAccuracy => &mut self.factual_accuracy,
            Criterion::Clarity => &mut self.clarity,
            Criterion::Neutrality => &mut self.neutrality,
            Criterion::Helpfulness => &mut self.helpfulness,
        };
        *slot = value;
    }

    /// Present scores in criterion order
    pub fn present(&self) -> impl Iterator<Item = (Criterion, u32)> + '_ {
        Criterion::ALL
            .into_iter()
            .filter_map(|c| self.get(c).map(|v| (c, v)))
    }
}

/// A JSON field that may be absent, explicitly `null`, or set.
///
/// Keeps the distinction between absent and `null` so a rewrite reproduces
/// what was read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Field<T> {
    #[default]
    Absent,
    Null,
    Value(T),
}

impl<T> Field<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Field::Value(value) => Some(value),
            Field::Absent | Field::Null => None,
        }
    }
}

impl<T: Default> Field<T> {
    /// Mutable access to the value, replacing absent or `null` with the default
    pub fn get_or_insert_default(&mut self) -> &mut T {
        if !matches!(self, Field::Value(_)) {
            *self = Field::Value(T::default());
        }
        match self {
            Field::Value(value) => value,
            Field::Absent | Field::Null => unreachable!(),
        }
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Value(value) => serializer.serialize_some(value),
            Field::Absent | Field::Null => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Field::Value(value),
            None => Field::Null,
        })
    }
}

/// Responses keyed by answer-generating model, in input order; `None` marks a missing response
pub type Responses = IndexMap<String, Option<String>>;

/// A health question together with the candidate responses collected so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: u64,
    /// Question text
    #[serde(rename = "question")]
    pub text: String,
    /// Reference ("ground truth") answer from an authoritative source
    #[serde(rename = "answer", default, skip_serializing_if = "Field::is_absent")]
    pub reference_answer: Field<String>,
    #[serde(rename = "aiResponse", default, skip_serializing_if = "Field::is_absent")]
    pub candidate_responses: Field<Responses>,
    /// Fields this tool does not interpret, kept verbatim on rewrite
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Question {
    /// Reference answer, treating an empty or blank value as missing
    pub fn reference(&self) -> Option<&str> {
        self.reference_answer
            .value()
            .map(String::as_str)
            .filter(|answer| !answer.trim().is_empty())
    }

    /// Reference answer as stored in an evaluation record
    pub fn reference_text(&self) -> String {
        self.reference_answer.value().cloned().unwrap_or_default()
    }

    /// `(model, response)` pairs in input order
    pub fn responses(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.candidate_responses
            .value()
            .into_iter()
            .flatten()
            .map(|(model, response)| (model.as_str(), response.as_deref()))
    }

    /// Non-null response of `model`, if any
    pub fn response(&self, model: &str) -> Option<&str> {
        self.candidate_responses
            .value()?
            .get(model)?
            .as_deref()
    }

    /// Record `text` as the response of `model`, keeping the position of an existing entry
    pub fn set_response(&mut self, model: &str, text: String) {
        self.candidate_responses
            .get_or_insert_default()
            .insert(model.to_string(), Some(text));
    }
}

/// The judge's verdict on one model's response to one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEvaluation {
    #[serde(flatten)]
    pub scores: Scores,
    #[serde(default)]
    pub justification: String,
    /// The exact response text that was judged
    pub response: String,
}

/// Canonical per-question record, keyed by question id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub id: u64,
    pub question: String,
    #[serde(rename = "ground_truth", default)]
    pub reference_answer: String,
    /// Evaluations keyed by model name, in the order they were first added
    #[serde(default)]
    pub evaluations: IndexMap<String, ModelEvaluation>,
}

impl EvaluationRecord {
    /// Create an empty record seeded from a question
    pub fn seeded(question: &Question) -> Self {
        Self {
            id: question.id,
            question: question.text.clone(),
            reference_answer: question.reference_text(),
            evaluations: IndexMap::new(),
        }
    }
}

/// Entry of the earlier single-response evaluation file
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyEvaluation {
    pub id: u64,
    #[serde(default)]
    pub gpt_response: Option<String>,
    /// Raw judge text
    #[serde(default)]
    pub evaluation: Option<String>,
}
