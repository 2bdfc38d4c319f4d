use std::collections::{BTreeMap, BTreeSet};

use crate::models::{Entry, MonthSummary, Question, QuestionAverage, QuickStats};

/// Narrows the entry collection before it is aggregated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryFilter {
    pub year: Option<i32>,
    pub course: Option<String>,
}

impl EntryFilter {
    pub fn matches(&self, entry: &Entry) -> bool {
        self.year.map_or(true, |year| entry.year == year)
            && self
                .course
                .as_deref()
                .map_or(true, |course| entry.course == course)
    }

    pub fn apply(&self, entries: &[Entry]) -> Vec<Entry> {
        entries
            .iter()
            .filter(|entry| self.matches(entry))
            .cloned()
            .collect()
    }

    pub fn describe(&self) -> String {
        match (self.year, self.course.as_deref()) {
            (None, None) => "all courses, all years".to_string(),
            (Some(year), None) => format!("all courses in {year}"),
            (None, Some(course)) => format!("{course}, all years"),
            (Some(year), Some(course)) => format!("{course} in {year}"),
        }
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Unweighted mean of an entry's non-null scores for the schema questions.
/// Score keys outside the schema are ignored.
pub fn entry_overall(entry: &Entry, questions: &[Question]) -> Option<f64> {
    let (sum, count) = questions
        .iter()
        .filter_map(|question| entry.score(&question.id))
        .fold((0.0, 0usize), |(sum, count), score| (sum + score, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[derive(Default)]
struct Bucket {
    entries: usize,
    participants: u64,
    overall_sum: f64,
    overall_weight: f64,
    question_sums: BTreeMap<String, (f64, f64)>,
}

pub fn aggregate(entries: &[Entry], questions: &[Question]) -> Vec<MonthSummary> {
    let mut buckets: BTreeMap<(i32, u32), Bucket> = BTreeMap::new();

    for entry in entries {
        let bucket = buckets.entry((entry.year, entry.month)).or_default();
        let weight = f64::from(entry.participants);
        bucket.entries += 1;
        bucket.participants += u64::from(entry.participants);

        if let Some(overall) = entry_overall(entry, questions) {
            bucket.overall_sum += overall * weight;
            bucket.overall_weight += weight;
        }

        for question in questions {
            if let Some(score) = entry.score(&question.id) {
                let sums = bucket.question_sums.entry(question.id.clone()).or_default();
                sums.0 += score * weight;
                sums.1 += weight;
            }
        }
    }

    buckets
        .into_iter()
        .map(|((year, month), bucket)| MonthSummary {
            year,
            month,
            entries: bucket.entries,
            participants: bucket.participants,
            overall: weighted(bucket.overall_sum, bucket.overall_weight),
            questions: questions
                .iter()
                .map(|question| QuestionAverage {
                    question_id: question.id.clone(),
                    value: bucket
                        .question_sums
                        .get(&question.id)
                        .and_then(|(sum, weight)| weighted(*sum, *weight)),
                })
                .collect(),
        })
        .collect()
}

fn weighted(sum: f64, weight: f64) -> Option<f64> {
    if weight > 0.0 {
        Some(round2(sum / weight))
    } else {
        None
    }
}

pub fn quick_stats(entries: &[Entry], questions: &[Question]) -> QuickStats {
    let mut overall_sum = 0.0;
    let mut overall_weight = 0.0;

    for entry in entries {
        if let Some(overall) = entry_overall(entry, questions) {
            let weight = f64::from(entry.participants);
            overall_sum += overall * weight;
            overall_weight += weight;
        }
    }

    QuickStats {
        courses: courses(entries).len(),
        entries: entries.len(),
        participants: entries.iter().map(|e| u64::from(e.participants)).sum(),
        overall: weighted(overall_sum, overall_weight),
    }
}

pub fn years(entries: &[Entry]) -> Vec<i32> {
    let years: BTreeSet<i32> = entries.iter().map(|e| e.year).collect();
    years.into_iter().collect()
}

pub fn courses(entries: &[Entry]) -> Vec<String> {
    let courses: BTreeSet<&str> = entries.iter().map(|e| e.course.as_str()).collect();
    courses.into_iter().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Settings;

    fn entry(
        course: &str,
        year: i32,
        month: u32,
        participants: u32,
        scores: &[(&str, Option<f64>)],
    ) -> Entry {
        Entry {
            id: crate::models::new_entry_id(),
            course: course.to_string(),
            year,
            month,
            participants,
            scores: scores
                .iter()
                .map(|(id, score)| (id.to_string(), *score))
                .collect(),
        }
    }

    fn questions() -> Vec<Question> {
        Settings::default().questions
    }

    #[test]
    fn single_entry_bucket_reports_its_score() {
        let entries = vec![entry("Welding 101", 2025, 3, 12, &[("Q1", Some(7.3))])];
        let months = aggregate(&entries, &questions());

        assert_eq!(months.len(), 1);
        assert_eq!(months[0].overall, Some(7.3));
        assert_eq!(months[0].question("Q1"), Some(7.3));
        assert_eq!(months[0].question("Q2"), None);
    }

    #[test]
    fn weights_overall_by_participants() {
        let entries = vec![
            entry("Course X", 2025, 9, 16, &[("Q1", Some(9.2))]),
            entry("Course Y", 2025, 9, 20, &[("Q1", Some(9.1))]),
        ];
        let months = aggregate(&entries, &questions());

        assert_eq!(months.len(), 1);
        assert_eq!(months[0].overall, Some(9.14));
        assert_eq!(months[0].participants, 36);
        assert_eq!(months[0].entries, 2);
    }

    #[test]
    fn entry_overall_is_unweighted_mean_of_present_scores() {
        let e = entry(
            "A",
            2025,
            1,
            5,
            &[("Q1", Some(8.0)), ("Q2", None), ("Q3", Some(6.0))],
        );
        assert_eq!(entry_overall(&e, &questions()), Some(7.0));

        let empty = entry("A", 2025, 1, 5, &[("Q1", None)]);
        assert_eq!(entry_overall(&empty, &questions()), None);
    }

    #[test]
    fn question_denominators_are_independent() {
        let entries = vec![
            entry("A", 2025, 4, 10, &[("Q1", Some(8.0)), ("Q2", Some(4.0))]),
            entry("B", 2025, 4, 30, &[("Q1", Some(6.0)), ("Q2", None)]),
        ];
        let months = aggregate(&entries, &questions());

        assert_eq!(months[0].question("Q1"), Some(6.5));
        assert_eq!(months[0].question("Q2"), Some(4.0));
        // (6.0 * 10 + 6.0 * 30) / 40
        assert_eq!(months[0].overall, Some(6.0));
    }

    #[test]
    fn scoreless_entries_leave_overall_absent() {
        let entries = vec![entry("A", 2024, 12, 8, &[])];
        let months = aggregate(&entries, &questions());

        assert_eq!(months.len(), 1);
        assert_eq!(months[0].overall, None);
        assert!(months[0].questions.iter().all(|q| q.value.is_none()));
    }

    #[test]
    fn buckets_are_sorted_by_year_then_month() {
        let entries = vec![
            entry("A", 2025, 2, 1, &[("Q1", Some(5.0))]),
            entry("A", 2024, 11, 1, &[("Q1", Some(5.0))]),
            entry("B", 2025, 1, 1, &[("Q1", Some(5.0))]),
            entry("B", 2025, 2, 1, &[("Q1", Some(7.0))]),
        ];
        let labels: Vec<String> = aggregate(&entries, &questions())
            .iter()
            .map(MonthSummary::label)
            .collect();

        assert_eq!(labels, vec!["2024-11", "2025-01", "2025-02"]);
    }

    #[test]
    fn filter_with_no_matching_course_yields_no_buckets() {
        let entries = vec![entry("A", 2025, 2, 1, &[("Q1", Some(5.0))])];
        let filter = EntryFilter {
            year: None,
            course: Some("Unknown".to_string()),
        };
        let months = aggregate(&filter.apply(&entries), &questions());
        assert!(months.is_empty());
    }

    #[test]
    fn filter_combines_year_and_course() {
        let entries = vec![
            entry("A", 2024, 2, 1, &[]),
            entry("A", 2025, 2, 1, &[]),
            entry("B", 2025, 3, 1, &[]),
        ];
        let filter = EntryFilter {
            year: Some(2025),
            course: Some("A".to_string()),
        };
        let kept = filter.apply(&entries);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].year, 2025);
        assert_eq!(filter.describe(), "A in 2025");
    }

    #[test]
    fn quick_stats_collapse_all_months() {
        let entries = vec![
            entry("Course X", 2025, 9, 16, &[("Q1", Some(9.2))]),
            entry("Course Y", 2025, 10, 20, &[("Q1", Some(9.1))]),
            entry("Course Y", 2025, 11, 4, &[]),
        ];
        let stats = quick_stats(&entries, &questions());

        assert_eq!(stats.courses, 2);
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.participants, 40);
        assert_eq!(stats.overall, Some(9.14));
    }

    #[test]
    fn scores_outside_the_schema_do_not_skew_the_overall() {
        let e = entry("A", 2025, 5, 10, &[("Q1", Some(8.0)), ("OLD", Some(2.0))]);
        assert_eq!(entry_overall(&e, &questions()), Some(8.0));

        let months = aggregate(&[e.clone()], &questions());
        assert_eq!(months[0].overall, Some(8.0));
        assert_eq!(months[0].question("Q1"), Some(8.0));
        assert_eq!(quick_stats(&[e], &questions()).overall, Some(8.0));
    }

    #[test]
    fn quick_stats_on_empty_collection() {
        let stats = quick_stats(&[], &questions());
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.overall, None);
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round2(9.144444), 9.14);
        assert_eq!(round2(9.145001), 9.15);
        assert_eq!(round2(7.0), 7.0);
    }

    #[test]
    fn lists_distinct_years_and_courses() {
        let entries = vec![
            entry("B", 2025, 1, 1, &[]),
            entry("A", 2024, 1, 1, &[]),
            entry("B", 2024, 5, 1, &[]),
        ];
        assert_eq!(years(&entries), vec![2024, 2025]);
        assert_eq!(courses(&entries), vec!["A", "B"]);
    }
}
