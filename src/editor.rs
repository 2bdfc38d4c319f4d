use std::collections::BTreeMap;

use thiserror::Error;

use crate::models::{new_entry_id, Entry, Settings};

#[derive(Debug, Error, PartialEq)]
pub enum EditorError {
    #[error("course must not be empty")]
    EmptyCourse,
    #[error("participants must be greater than zero")]
    NoParticipants,
    #[error("month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),
    #[error("unknown question id {0}")]
    UnknownQuestion(String),
}

/// Raw form input for creating or editing one entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryDraft {
    pub id: Option<String>,
    pub course: String,
    pub year: i32,
    pub month: u32,
    pub participants: i64,
    pub scores: Vec<(String, String)>,
}

impl EntryDraft {
    pub fn from_entry(entry: &Entry) -> Self {
        Self {
            id: Some(entry.id.clone()),
            course: entry.course.clone(),
            year: entry.year,
            month: entry.month,
            participants: i64::from(entry.participants),
            scores: entry
                .scores
                .iter()
                .map(|(id, score)| (id.clone(), score.map(|s| s.to_string()).unwrap_or_default()))
                .collect(),
        }
    }

    /// Replaces (or adds) the raw text for one question.
    pub fn set_score(&mut self, question_id: &str, raw: &str) {
        match self.scores.iter_mut().find(|(id, _)| id == question_id) {
            Some((_, value)) => *value = raw.to_string(),
            None => self.scores.push((question_id.to_string(), raw.to_string())),
        }
    }
}

/// Validates a draft into an entry ready for the store. Scores that are not
/// numbers are stored as absent; the rest are clamped to the settings scale.
pub fn submit(draft: &EntryDraft, settings: &Settings) -> Result<Entry, EditorError> {
    let course = draft.course.trim();
    if course.is_empty() {
        return Err(EditorError::EmptyCourse);
    }
    if draft.participants <= 0 {
        return Err(EditorError::NoParticipants);
    }
    if !(1..=12).contains(&draft.month) {
        return Err(EditorError::InvalidMonth(draft.month));
    }
    let participants =
        u32::try_from(draft.participants).map_err(|_| EditorError::NoParticipants)?;

    let scale = settings.scale();
    let mut scores: BTreeMap<String, Option<f64>> = settings
        .questions
        .iter()
        .map(|q| (q.id.clone(), None))
        .collect();

    for (question_id, raw) in &draft.scores {
        let slot = scores
            .get_mut(question_id)
            .ok_or_else(|| EditorError::UnknownQuestion(question_id.clone()))?;
        *slot = raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|s| s.is_finite())
            .map(|s| scale.clamp(s));
    }

    Ok(Entry {
        id: draft.id.clone().unwrap_or_else(new_entry_id),
        course: course.to_string(),
        year: draft.year,
        month: draft.month,
        participants,
        scores,
    })
}
