use serde::{Deserialize, Serialize};
use std::fmt;

/// Topical category of a health question, derived for reporting only
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Pregnancy/Reproductive Health")]
    PregnancyReproductive,
    #[serde(rename = "Mental Health")]
    MentalHealth,
    #[serde(rename = "Medical Procedures")]
    MedicalProcedures,
    #[serde(rename = "Cardiovascular Health")]
    Cardiovascular,
    #[serde(rename = "Nutrition/Lifestyle")]
    NutritionLifestyle,
    #[serde(rename = "General Health")]
    GeneralHealth,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::PregnancyReproductive => "Pregnancy/Reproductive Health",
            Category::MentalHealth => "Mental Health",
            Category::MedicalProcedures => "Medical Procedures",
            Category::Cardiovascular => "Cardiovascular Health",
            Category::NutritionLifestyle => "Nutrition/Lifestyle",
            Category::GeneralHealth => "General Health",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// Checked top to bottom; the first rule with any keyword in the question wins.
const RULES: &[(Category, &[&str])] = &[
    (
        Category::PregnancyReproductive,
        &["pregnant", "pregnancy", "birth", "c section", "uterus", "iud"],
    ),
    (
        Category::MentalHealth,
        &["psychologist", "meds", "medication", "antidepressant", "mental"],
    ),
    (
        Category::MedicalProcedures,
        &["surgery", "mri", "doctor", "medical", "procedure", "vaccine"],
    ),
    (
        Category::Cardiovascular,
        &["blood pressure", "diabetes", "stroke", "heart"],
    ),
    (
        Category::NutritionLifestyle,
        &["nutrient", "vitamin", "diet", "food", "water", "sleep"],
    ),
];

/// Assign a question to exactly one category by keyword rule priority
pub fn categorize(question: &str) -> Category {
    let lowered = question.to_lowercase();

    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| lowered.contains(keyword)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::GeneralHealth)
}
