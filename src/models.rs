use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One survey submission for a course in a given year and month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub course: String,
    pub year: i32,
    pub month: u32,
    pub participants: u32,
    #[serde(default)]
    pub scores: BTreeMap<String, Option<f64>>,
}

impl Entry {
    pub fn score(&self, question_id: &str) -> Option<f64> {
        self.scores.get(question_id).copied().flatten()
    }
}

pub fn new_entry_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub questions: Vec<Question>,
    pub scale_min: f64,
    pub scale_max: f64,
}

impl Settings {
    pub fn with_scale(scale: Scale) -> Self {
        let questions = [
            ("Q1", "Overall satisfaction"),
            ("Q2", "Instructor clarity"),
            ("Q3", "Course materials"),
            ("Q4", "Pace and workload"),
            ("Q5", "Likelihood to recommend"),
        ]
        .into_iter()
        .map(|(id, label)| Question {
            id: id.to_string(),
            label: label.to_string(),
        })
        .collect();

        Self {
            questions,
            scale_min: scale.min,
            scale_max: scale.max,
        }
    }

    pub fn scale(&self) -> Scale {
        Scale {
            min: self.scale_min,
            max: self.scale_max,
        }
    }

    pub fn question_ids(&self) -> Vec<String> {
        self.questions.iter().map(|q| q.id.clone()).collect()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_scale(Scale::default())
    }
}

/// Inclusive bounds applied to every score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub min: f64,
    pub max: f64,
}

impl Scale {
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self { min: 1.0, max: 10.0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionAverage {
    pub question_id: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthSummary {
    pub year: i32,
    pub month: u32,
    pub entries: usize,
    pub participants: u64,
    pub overall: Option<f64>,
    pub questions: Vec<QuestionAverage>,
}

impl MonthSummary {
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    pub fn question(&self, question_id: &str) -> Option<f64> {
        self.questions
            .iter()
            .find(|q| q.question_id == question_id)
            .and_then(|q| q.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuickStats {
    pub courses: usize,
    pub entries: usize,
    pub participants: u64,
    pub overall: Option<f64>,
}
