use std::collections::HashMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::aggregate::{DashboardReport, RECENT_WINDOW_DAYS};
use crate::models::{Disease, SurveillanceImage};

#[derive(Debug, Clone, PartialEq)]
pub struct UploadDay {
    pub day: chrono::NaiveDate,
    pub count: usize,
}

/// Uploads per calendar day, newest day first.
pub fn uploads_by_day(images: &[SurveillanceImage]) -> Vec<UploadDay> {
    let mut map: HashMap<chrono::NaiveDate, usize> = HashMap::new();
    for image in images {
        *map.entry(image.uploaded_at.date_naive()).or_insert(0) += 1;
    }

    let mut days: Vec<UploadDay> = map
        .into_iter()
        .map(|(day, count)| UploadDay { day, count })
        .collect();
    days.sort_by(|a, b| b.day.cmp(&a.day));
    days
}

pub fn build_report(
    scope: Option<Disease>,
    generated_at: DateTime<Utc>,
    dashboard: &DashboardReport,
    images: &[SurveillanceImage],
) -> String {
    let stats = &dashboard.stats;
    let mut output = String::new();
    let scope_label = scope.map_or("all diseases", |d| d.as_str());

    let _ = writeln!(output, "# Surveillance Dashboard Report");
    let _ = writeln!(
        output,
        "Generated for {} at {}",
        scope_label,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Image Counts");
    let _ = writeln!(output, "- Total images: {}", stats.total_images);
    let _ = writeln!(output, "- Malaria images: {}", stats.malaria_images);
    let _ = writeln!(output, "- Leptospirosis images: {}", stats.leptospirosis_images);
    let _ = writeln!(
        output,
        "- Recent uploads (last {} days): {}",
        RECENT_WINDOW_DAYS, stats.recent_uploads
    );

    if !dashboard.failures.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "> {} count(s) could not be loaded and are shown as 0.",
            dashboard.failures.len()
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Uploads by Day");
    let days = uploads_by_day(images);
    if days.is_empty() {
        let _ = writeln!(output, "No images uploaded yet.");
    } else {
        for day in days.iter().take(14) {
            let _ = writeln!(output, "- {}: {} images", day.day, day.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Latest Uploads");
    if images.is_empty() {
        let _ = writeln!(output, "No images uploaded yet.");
    } else {
        for image in images.iter().take(10) {
            let _ = write!(
                output,
                "- {} ({}) on {}",
                image.file_name,
                image.disease,
                image.uploaded_at.date_naive()
            );
            match &image.description {
                Some(description) => {
                    let _ = writeln!(output, ": {description}");
                }
                None => {
                    let _ = writeln!(output);
                }
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    use crate::error::AggregationError;
    use crate::models::DashboardStats;

    fn image(disease: Disease, uploaded_at: DateTime<Utc>, description: Option<&str>) -> SurveillanceImage {
        SurveillanceImage {
            id: Uuid::new_v4(),
            disease,
            file_path: "owner/1.jpg".to_string(),
            file_name: "drain.jpg".to_string(),
            description: description.map(str::to_string),
            uploaded_at,
        }
    }

    #[test]
    fn groups_uploads_by_day_newest_first() {
        let day = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
        let images = vec![
            image(Disease::Malaria, day, None),
            image(Disease::Malaria, day + Duration::hours(3), None),
            image(Disease::Leptospirosis, day + Duration::days(1), None),
        ];

        let days = uploads_by_day(&images);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].count, 1);
        assert_eq!(days[1].count, 2);
        assert!(days[0].day > days[1].day);
    }

    #[test]
    fn report_lists_counts_and_latest_uploads() {
        let now = Utc.with_ymd_and_hms(2026, 3, 12, 8, 30, 0).unwrap();
        let dashboard = DashboardReport {
            stats: DashboardStats {
                total_images: 10,
                malaria_images: 6,
                leptospirosis_images: 4,
                recent_uploads: 2,
            },
            failures: Vec::new(),
        };
        let images = vec![image(
            Disease::Leptospirosis,
            now - Duration::days(1),
            Some("Rodent droppings near market drain"),
        )];

        let report = build_report(None, now, &dashboard, &images);
        assert!(report.contains("Generated for all diseases at 2026-03-12 08:30 UTC"));
        assert!(report.contains("- Total images: 10"));
        assert!(report.contains("- Recent uploads (last 7 days): 2"));
        assert!(report.contains("drain.jpg (leptospirosis) on 2026-03-11: Rodent droppings"));
        assert!(!report.contains("could not be loaded"));
    }

    #[test]
    fn report_flags_failed_counts() {
        let dashboard = DashboardReport {
            stats: DashboardStats::default(),
            failures: vec![AggregationError {
                query: "count_images",
                message: "timeout".to_string(),
            }],
        };

        let report = build_report(Some(Disease::Malaria), Utc::now(), &dashboard, &[]);
        assert!(report.contains("Generated for malaria"));
        assert!(report.contains("1 count(s) could not be loaded"));
        assert!(report.contains("No images uploaded yet."));
    }
}
