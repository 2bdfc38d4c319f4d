use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{Entry, MonthSummary, QuickStats, Settings};
use crate::trends::{self, EntryFilter};

const BAR_WIDTH: f64 = 30.0;

pub fn format_score(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

/// Text bar proportional to where `value` sits on the settings scale.
pub fn score_bar(value: Option<f64>, settings: &Settings) -> String {
    let Some(value) = value else {
        return String::new();
    };
    let span = settings.scale_max - settings.scale_min;
    let fraction = if span > 0.0 {
        ((value - settings.scale_min) / span).clamp(0.0, 1.0)
    } else {
        1.0
    };
    "#".repeat((fraction * BAR_WIDTH).round() as usize)
}

pub fn format_stats(stats: &QuickStats) -> Vec<String> {
    vec![
        format!("Courses: {}", stats.courses),
        format!("Entries: {}", stats.entries),
        format!("Participants: {}", stats.participants),
        format!("Weighted overall: {}", format_score(stats.overall)),
    ]
}

pub fn build_report(
    filter: &EntryFilter,
    settings: &Settings,
    entries: &[Entry],
    generated_on: NaiveDate,
) -> String {
    let filtered = filter.apply(entries);
    let months = trends::aggregate(&filtered, &settings.questions);
    let stats = trends::quick_stats(&filtered, &settings.questions);

    let mut output = String::new();

    let _ = writeln!(output, "# Course Survey Trends");
    let _ = writeln!(
        output,
        "Generated {} for {} (scale {}-{})",
        generated_on,
        filter.describe(),
        settings.scale_min,
        settings.scale_max
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Quick Stats");
    for line in format_stats(&stats) {
        let _ = writeln!(output, "- {line}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Weighted Overall");
    if months.is_empty() {
        let _ = writeln!(output, "No entries match these filters.");
    } else {
        let _ = writeln!(output, "```");
        for month in &months {
            let _ = writeln!(
                output,
                "{} {:>5} {}",
                month.label(),
                format_score(month.overall),
                score_bar(month.overall, settings)
            );
        }
        let _ = writeln!(output, "```");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Question Averages by Month");
    if months.is_empty() {
        let _ = writeln!(output, "No entries match these filters.");
    } else {
        write_question_table(&mut output, settings, &months);
    }

    let mut recent = filtered;
    recent.sort_by(|a, b| (b.year, b.month).cmp(&(a.year, a.month)));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Entries");
    if recent.is_empty() {
        let _ = writeln!(output, "No entries recorded.");
    } else {
        let _ = writeln!(output, "| Month | Course | Participants | Overall |");
        let _ = writeln!(output, "|---|---|---|---|");
        for entry in &recent {
            let overall = trends::entry_overall(entry, &settings.questions).map(trends::round2);
            let _ = writeln!(
                output,
                "| {:04}-{:02} | {} | {} | {} |",
                entry.year,
                entry.month,
                entry.course,
                entry.participants,
                format_score(overall)
            );
        }
    }

    output
}

fn write_question_table(output: &mut String, settings: &Settings, months: &[MonthSummary]) {
    let mut header = String::from("| Month |");
    let mut divider = String::from("|---|");
    for question in &settings.questions {
        let _ = write!(header, " {} |", question.label);
        divider.push_str("---|");
    }
    let _ = writeln!(output, "{header}");
    let _ = writeln!(output, "{divider}");

    for month in months {
        let mut row = format!("| {} |", month.label());
        for question in &settings.questions {
            let _ = write!(row, " {} |", format_score(month.question(&question.id)));
        }
        let _ = writeln!(output, "{row}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<Entry> {
        vec![
            Entry {
                id: "x".to_string(),
                course: "Course X".to_string(),
                year: 2025,
                month: 9,
                participants: 16,
                scores: [("Q1".to_string(), Some(9.2))].into_iter().collect(),
            },
            Entry {
                id: "y".to_string(),
                course: "Course Y".to_string(),
                year: 2025,
                month: 9,
                participants: 20,
                scores: [("Q1".to_string(), Some(9.1))].into_iter().collect(),
            },
            Entry {
                id: "z".to_string(),
                course: "Course Y".to_string(),
                year: 2024,
                month: 12,
                participants: 5,
                scores: [("Q2".to_string(), Some(4.0))].into_iter().collect(),
            },
        ]
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 1).unwrap()
    }

    #[test]
    fn report_contains_stats_trend_and_tables() {
        let report = build_report(
            &EntryFilter::default(),
            &Settings::default(),
            &entries(),
            date(),
        );

        assert!(report.contains("Generated 2025-10-01 for all courses, all years"));
        assert!(report.contains("- Participants: 41"));
        assert!(report.contains("2025-09  9.14"));
        assert!(report.contains("| Month | Overall satisfaction | Instructor clarity |"));
        assert!(report.contains("| 2024-12 | - | 4.00 | - | - | - |"));

        let newest = report.find("| 2025-09 | Course X").unwrap();
        let oldest = report.find("| 2024-12 | Course Y").unwrap();
        assert!(newest < oldest);
    }

    #[test]
    fn empty_filter_result_is_reported_not_failed() {
        let filter = EntryFilter {
            year: None,
            course: Some("Nobody".to_string()),
        };
        let report = build_report(&filter, &Settings::default(), &entries(), date());

        assert!(report.contains("No entries match these filters."));
        assert!(report.contains("- Weighted overall: -"));
    }

    #[test]
    fn bars_scale_with_the_settings_range() {
        let settings = Settings::default();
        assert_eq!(score_bar(Some(10.0), &settings).len(), 30);
        assert_eq!(score_bar(Some(1.0), &settings).len(), 0);
        assert_eq!(score_bar(Some(5.5), &settings).len(), 15);
        assert_eq!(score_bar(None, &settings), "");
    }
}
