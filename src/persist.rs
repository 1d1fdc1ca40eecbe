//! Writes computed indices one record at a time.
//!
//! There is no transaction around a cycle: every computed index gets its own
//! insert, a failed insert does not stop the ones after it, and the caller
//! receives the outcome of each write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::PersistenceError;
use crate::indices::ComputedIndices;
use crate::models::{IndexType, NewComputedIndex};
use crate::survey::SurveySample;

#[async_trait]
pub trait IndexStore {
    async fn insert_index(&self, record: &NewComputedIndex) -> Result<Uuid, PersistenceError>;
}

#[derive(Debug)]
pub struct WriteOutcome {
    pub index_type: IndexType,
    pub value: f64,
    pub result: Result<Uuid, PersistenceError>,
}

impl WriteOutcome {
    pub fn describe(&self) -> String {
        let value = self.index_type.format_value(self.value);
        match &self.result {
            Ok(_) => format!("{} ({value}) saved", self.index_type.label()),
            Err(err) => format!("{} ({value}) not saved: {}", self.index_type.label(), err.message),
        }
    }
}

#[derive(Debug, Default)]
pub struct PersistenceReport {
    pub outcomes: Vec<WriteOutcome>,
}

impl PersistenceReport {
    pub fn saved(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &PersistenceError> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err())
    }

    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn is_partial(&self) -> bool {
        let saved = self.saved();
        saved > 0 && saved < self.outcomes.len()
    }
}

pub async fn persist_computed_indices<S>(
    store: &S,
    owner: Uuid,
    indices: &ComputedIndices,
    sample: &SurveySample,
    computed_at: DateTime<Utc>,
) -> PersistenceReport
where
    S: IndexStore + Sync + ?Sized,
{
    let disease = sample.disease();
    let input_data = sample.snapshot();
    let mut report = PersistenceReport::default();

    for (index_type, value) in indices.values() {
        let record = NewComputedIndex {
            owner,
            disease,
            index_type,
            calculated_value: value,
            input_data: input_data.clone(),
            computed_at,
        };

        let result = store.insert_index(&record).await;
        match &result {
            Ok(id) => tracing::info!(%id, %disease, %index_type, value, "index saved"),
            Err(err) => tracing::warn!(%disease, %index_type, error = %err, "index write failed"),
        }

        report.outcomes.push(WriteOutcome {
            index_type,
            value,
            result,
        });
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::cycle::compute;
    use crate::models::Disease;
    use crate::survey::{LeptospirosisInput, LeptospirosisSample, MalariaInput, MalariaSample};

    #[derive(Default)]
    struct MemoryStore {
        fail_on: Vec<IndexType>,
        rows: Mutex<Vec<NewComputedIndex>>,
        attempts: Mutex<Vec<IndexType>>,
    }

    #[async_trait]
    impl IndexStore for MemoryStore {
        async fn insert_index(&self, record: &NewComputedIndex) -> Result<Uuid, PersistenceError> {
            self.attempts.lock().unwrap().push(record.index_type);
            if self.fail_on.contains(&record.index_type) {
                return Err(PersistenceError {
                    index_type: record.index_type,
                    message: "connection reset".to_string(),
                });
            }
            self.rows.lock().unwrap().push(record.clone());
            Ok(Uuid::new_v4())
        }
    }

    fn text(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    fn full_malaria() -> SurveySample {
        SurveySample::Malaria(MalariaSample::validate(&MalariaInput {
            houses_inspected: text("100"),
            houses_with_larvae: text("25"),
            containers_inspected: text("500"),
            containers_with_larvae: text("75"),
            positive_containers: text("75"),
        }))
    }

    #[tokio::test]
    async fn writes_one_record_per_computed_index() {
        let store = MemoryStore::default();
        let owner = Uuid::new_v4();
        let sample = full_malaria();
        let indices = compute(&sample);

        let report = persist_computed_indices(&store, owner, &indices, &sample, Utc::now()).await;

        assert!(report.is_complete());
        assert_eq!(report.saved(), 3);
        let rows = store.rows.lock().unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.owner == owner && r.disease == Disease::Malaria));
        assert_eq!(rows[2].index_type, IndexType::BreteauIndex);
        assert_eq!(rows[2].calculated_value, 75.0);
        assert_eq!(rows[0].input_data["housesInspected"], 100);
    }

    #[tokio::test]
    async fn failed_write_does_not_stop_later_writes() {
        let store = MemoryStore {
            fail_on: vec![IndexType::ContainerIndex],
            ..Default::default()
        };
        let sample = full_malaria();
        let indices = compute(&sample);

        let report =
            persist_computed_indices(&store, Uuid::new_v4(), &indices, &sample, Utc::now()).await;

        assert!(report.is_partial());
        assert_eq!(report.saved(), 2);
        let failed: Vec<IndexType> = report.failures().map(|e| e.index_type).collect();
        assert_eq!(failed, vec![IndexType::ContainerIndex]);
        assert_eq!(
            *store.attempts.lock().unwrap(),
            vec![
                IndexType::HouseIndex,
                IndexType::ContainerIndex,
                IndexType::BreteauIndex
            ]
        );
        assert_eq!(store.rows.lock().unwrap().len(), 2);

        let lines: Vec<String> = report.outcomes.iter().map(WriteOutcome::describe).collect();
        assert_eq!(
            lines,
            vec![
                "House Index (25%) saved".to_string(),
                "Container Index (15%) not saved: connection reset".to_string(),
                "Breteau Index (75 per 100 houses) saved".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn skipped_indices_are_never_written() {
        let store = MemoryStore::default();
        let sample = SurveySample::Leptospirosis(LeptospirosisSample::validate(
            &LeptospirosisInput {
                locations_inspected: text("0"),
                locations_with_rodents: text("0"),
                total_rodents_caught: text("20"),
                infected_rodents: text("0"),
            },
        ));
        let indices = compute(&sample);

        let report =
            persist_computed_indices(&store, Uuid::new_v4(), &indices, &sample, Utc::now()).await;

        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].index_type, IndexType::InfectionRate);
        assert_eq!(report.outcomes[0].value, 0.0);
        assert!(!report.is_partial());
    }
}
