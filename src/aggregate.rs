use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::AggregationError;
use crate::models::{DashboardStats, Disease, ImageFilter, SurveillanceImage};

pub const RECENT_WINDOW_DAYS: i64 = 7;

/// Read access to the surveillance image records held by the upload side.
#[async_trait]
pub trait ImageCatalog {
    async fn count_images(&self, filter: &ImageFilter) -> Result<i64, AggregationError>;

    /// Newest first.
    async fn list_images(
        &self,
        filter: &ImageFilter,
    ) -> Result<Vec<SurveillanceImage>, AggregationError>;
}

#[derive(Debug, Default)]
pub struct DashboardReport {
    pub stats: DashboardStats,
    /// Queries that failed; their counts are reported as zero.
    pub failures: Vec<AggregationError>,
}

pub fn recent_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(RECENT_WINDOW_DAYS)
}

/// Narrow `filter` to the dashboard scope. `None` means the two can never
/// both match, so the count is zero without asking the catalog.
fn scoped(scope: Option<Disease>, filter: ImageFilter) -> Option<ImageFilter> {
    match (scope, filter.disease) {
        (Some(s), Some(d)) if s != d => None,
        (Some(s), _) => Some(ImageFilter {
            disease: Some(s),
            ..filter
        }),
        (None, _) => Some(filter),
    }
}

async fn count<C>(
    catalog: &C,
    scope: Option<Disease>,
    filter: ImageFilter,
) -> Result<i64, AggregationError>
where
    C: ImageCatalog + Sync + ?Sized,
{
    match scoped(scope, filter) {
        Some(filter) => catalog.count_images(&filter).await,
        None => Ok(0),
    }
}

/// Recomputed from the catalog on every call; nothing is cached.
pub async fn get_dashboard_stats<C>(
    catalog: &C,
    scope: Option<Disease>,
    now: DateTime<Utc>,
) -> DashboardReport
where
    C: ImageCatalog + Sync + ?Sized,
{
    let (total, malaria, leptospirosis, recent) = tokio::join!(
        count(catalog, scope, ImageFilter::all()),
        count(catalog, scope, ImageFilter::disease(Disease::Malaria)),
        count(catalog, scope, ImageFilter::disease(Disease::Leptospirosis)),
        count(catalog, scope, ImageFilter::since(recent_cutoff(now))),
    );

    let mut failures = Vec::new();
    let mut take = |result: Result<i64, AggregationError>| match result {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error = %err, "dashboard count defaulted to zero");
            failures.push(err);
            0
        }
    };

    let stats = DashboardStats {
        total_images: take(total),
        malaria_images: take(malaria),
        leptospirosis_images: take(leptospirosis),
        recent_uploads: take(recent),
    };

    DashboardReport { stats, failures }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn matches(filter: &ImageFilter, image: &SurveillanceImage) -> bool {
        filter.disease.map_or(true, |d| image.disease == d)
            && filter
                .uploaded_since
                .map_or(true, |since| image.uploaded_at >= since)
    }

    struct MemoryCatalog {
        images: Vec<SurveillanceImage>,
        broken: Option<ImageFilter>,
    }

    #[async_trait]
    impl ImageCatalog for MemoryCatalog {
        async fn count_images(&self, filter: &ImageFilter) -> Result<i64, AggregationError> {
            if self.broken.as_ref() == Some(filter) {
                return Err(AggregationError {
                    query: "count_images",
                    message: "timeout".to_string(),
                });
            }
            Ok(self.images.iter().filter(|i| matches(filter, i)).count() as i64)
        }

        async fn list_images(
            &self,
            filter: &ImageFilter,
        ) -> Result<Vec<SurveillanceImage>, AggregationError> {
            let mut images: Vec<SurveillanceImage> = self
                .images
                .iter()
                .filter(|i| matches(filter, i))
                .cloned()
                .collect();
            images.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
            Ok(images)
        }
    }

    fn image(disease: Disease, uploaded_at: DateTime<Utc>) -> SurveillanceImage {
        SurveillanceImage {
            id: Uuid::new_v4(),
            disease,
            file_path: format!("field-team/{}.jpg", uploaded_at.timestamp_millis()),
            file_name: "site.jpg".to_string(),
            description: None,
            uploaded_at,
        }
    }

    /// 6 malaria + 4 leptospirosis, two of them inside the last week.
    fn catalog(now: DateTime<Utc>) -> MemoryCatalog {
        let mut images = Vec::new();
        for day in [1, 30, 40, 50, 60, 70] {
            images.push(image(Disease::Malaria, now - Duration::days(day)));
        }
        for day in [3, 20, 25, 90] {
            images.push(image(Disease::Leptospirosis, now - Duration::days(day)));
        }
        MemoryCatalog {
            images,
            broken: None,
        }
    }

    #[tokio::test]
    async fn counts_totals_per_disease_and_recent() {
        let now = Utc::now();
        let report = get_dashboard_stats(&catalog(now), None, now).await;

        assert!(report.failures.is_empty());
        assert_eq!(
            report.stats,
            DashboardStats {
                total_images: 10,
                malaria_images: 6,
                leptospirosis_images: 4,
                recent_uploads: 2,
            }
        );
    }

    #[tokio::test]
    async fn recent_window_includes_exact_cutoff() {
        let now = Utc::now();
        let mut catalog = catalog(now);
        catalog.images.push(image(Disease::Malaria, recent_cutoff(now)));

        let report = get_dashboard_stats(&catalog, None, now).await;
        assert_eq!(report.stats.recent_uploads, 3);
    }

    #[tokio::test]
    async fn scope_restricts_every_count() {
        let now = Utc::now();
        let report = get_dashboard_stats(&catalog(now), Some(Disease::Leptospirosis), now).await;

        assert_eq!(report.stats.total_images, 4);
        assert_eq!(report.stats.malaria_images, 0);
        assert_eq!(report.stats.leptospirosis_images, 4);
        assert_eq!(report.stats.recent_uploads, 1);
    }

    #[tokio::test]
    async fn failed_query_defaults_to_zero_and_is_reported() {
        let now = Utc::now();
        let mut catalog = catalog(now);
        catalog.broken = Some(ImageFilter::disease(Disease::Malaria));

        let report = get_dashboard_stats(&catalog, None, now).await;
        assert_eq!(report.stats.malaria_images, 0);
        assert_eq!(report.stats.total_images, 10);
        assert_eq!(report.failures.len(), 1);
    }

    #[tokio::test]
    async fn stats_reflect_new_uploads_immediately() {
        let now = Utc::now();
        let mut catalog = catalog(now);
        let before = get_dashboard_stats(&catalog, None, now).await.stats;

        catalog.images.push(image(Disease::Leptospirosis, now));
        let after = get_dashboard_stats(&catalog, None, now).await.stats;

        assert_eq!(after.total_images, before.total_images + 1);
        assert_eq!(after.recent_uploads, before.recent_uploads + 1);
    }
}
