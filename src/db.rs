use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::aggregate::ImageCatalog;
use crate::error::{AggregationError, PersistenceError};
use crate::models::{Disease, ImageFilter, NewComputedIndex, SurveillanceImage};
use crate::persist::IndexStore;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool, owner: Uuid) -> anyhow::Result<usize> {
    let now = Utc::now();
    let images = vec![
        (
            Disease::Malaria,
            "water-drum-larvae.jpg",
            Some("Open water drum behind household 14"),
            now - Duration::days(2),
        ),
        (
            Disease::Malaria,
            "tyre-stack.jpg",
            Some("Discarded tyres holding rainwater"),
            now - Duration::days(12),
        ),
        (
            Disease::Malaria,
            "roof-gutter.jpg",
            None,
            now - Duration::days(31),
        ),
        (
            Disease::Leptospirosis,
            "rice-field-burrows.jpg",
            Some("Burrows along irrigation channel"),
            now - Duration::days(4),
        ),
        (
            Disease::Leptospirosis,
            "market-drain.jpg",
            Some("Rodent droppings near market drain"),
            now - Duration::days(20),
        ),
    ];

    let mut inserted = 0usize;
    for (disease, file_name, description, uploaded_at) in images {
        let file_path = format!("{owner}/{}.jpg", uploaded_at.timestamp_millis());
        let result = sqlx::query(
            r#"
            INSERT INTO vector_surveillance.images
            (id, user_id, disease, file_path, file_name, description, uploaded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(disease.as_str())
        .bind(file_path)
        .bind(file_name)
        .bind(description)
        .bind(uploaded_at)
        .execute(pool)
        .await?;
        inserted += result.rows_affected() as usize;
    }

    Ok(inserted)
}

pub async fn record_image(
    pool: &PgPool,
    owner: Uuid,
    disease: Disease,
    file_path: &str,
    file_name: &str,
    description: Option<&str>,
) -> anyhow::Result<Uuid> {
    let description = description.map(str::trim).filter(|d| !d.is_empty());
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO vector_surveillance.images
        (id, user_id, disease, file_path, file_name, description)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner)
    .bind(disease.as_str())
    .bind(file_path)
    .bind(file_name)
    .bind(description)
    .fetch_one(pool)
    .await
    .context("failed to record uploaded image")?
    .get("id");

    Ok(id)
}

/// Postgres-backed index writes and image reads.
#[derive(Debug, Clone)]
pub struct PgSurveillanceStore {
    pool: PgPool,
}

impl PgSurveillanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Appends the filter's WHERE clause; returns the values to bind in order.
fn push_filter(query: &mut String, filter: &ImageFilter) -> (Option<Disease>, Option<DateTime<Utc>>) {
    let mut clauses: Vec<String> = Vec::new();

    if filter.disease.is_some() {
        clauses.push(format!("disease = ${}", clauses.len() + 1));
    }
    if filter.uploaded_since.is_some() {
        clauses.push(format!("uploaded_at >= ${}", clauses.len() + 1));
    }

    if !clauses.is_empty() {
        query.push_str(" WHERE ");
        query.push_str(&clauses.join(" AND "));
    }

    (filter.disease, filter.uploaded_since)
}

#[async_trait]
impl IndexStore for PgSurveillanceStore {
    async fn insert_index(&self, record: &NewComputedIndex) -> Result<Uuid, PersistenceError> {
        let row = sqlx::query(
            r#"
            INSERT INTO vector_surveillance.disease_indices
            (id, user_id, disease, index_type, calculated_value, input_data, computed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.owner)
        .bind(record.disease.as_str())
        .bind(record.index_type.as_str())
        .bind(record.calculated_value)
        .bind(&record.input_data)
        .bind(record.computed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| PersistenceError {
            index_type: record.index_type,
            message: err.to_string(),
        })?;

        Ok(row.get("id"))
    }
}

#[async_trait]
impl ImageCatalog for PgSurveillanceStore {
    async fn count_images(&self, filter: &ImageFilter) -> Result<i64, AggregationError> {
        let mut query = String::from("SELECT COUNT(*) FROM vector_surveillance.images");
        let (disease, since) = push_filter(&mut query, filter);

        let mut rows = sqlx::query_scalar::<_, i64>(&query);
        if let Some(value) = disease {
            rows = rows.bind(value.as_str());
        }
        if let Some(value) = since {
            rows = rows.bind(value);
        }

        rows.fetch_one(&self.pool)
            .await
            .map_err(|err| AggregationError {
                query: "count_images",
                message: err.to_string(),
            })
    }

    async fn list_images(
        &self,
        filter: &ImageFilter,
    ) -> Result<Vec<SurveillanceImage>, AggregationError> {
        let mut query = String::from(
            "SELECT id, disease, file_path, file_name, description, uploaded_at \
             FROM vector_surveillance.images",
        );
        let (disease, since) = push_filter(&mut query, filter);
        query.push_str(" ORDER BY uploaded_at DESC");

        let mut rows = sqlx::query(&query);
        if let Some(value) = disease {
            rows = rows.bind(value.as_str());
        }
        if let Some(value) = since {
            rows = rows.bind(value);
        }

        let to_error = |message: String| AggregationError {
            query: "list_images",
            message,
        };

        let records = rows
            .fetch_all(&self.pool)
            .await
            .map_err(|err| to_error(err.to_string()))?;

        let mut images = Vec::with_capacity(records.len());
        for row in records {
            let disease: String = row.get("disease");
            images.push(SurveillanceImage {
                id: row.get("id"),
                disease: disease
                    .parse()
                    .map_err(|err: anyhow::Error| to_error(err.to_string()))?,
                file_path: row.get("file_path"),
                file_name: row.get("file_name"),
                description: row.get("description"),
                uploaded_at: row.get("uploaded_at"),
            });
        }

        Ok(images)
    }
}
