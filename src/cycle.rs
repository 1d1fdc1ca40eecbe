//! One surveillance cycle: raw counts in, indices out, indices saved.

use std::path::Path;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::indices::{compute_leptospirosis_indices, compute_malaria_indices, ComputedIndices};
use crate::models::Disease;
use crate::persist::{persist_computed_indices, IndexStore, PersistenceReport};
use crate::survey::{
    LeptospirosisInput, LeptospirosisSample, MalariaInput, MalariaSample, SurveySample,
};

#[derive(Debug)]
pub struct CycleOutcome {
    pub sample: SurveySample,
    pub indices: ComputedIndices,
    /// `None` when nothing was written: no store or identity, or nothing computed.
    pub persistence: Option<PersistenceReport>,
}

pub fn compute(sample: &SurveySample) -> ComputedIndices {
    match sample {
        SurveySample::Malaria(m) => ComputedIndices::Malaria(compute_malaria_indices(m)),
        SurveySample::Leptospirosis(l) => {
            ComputedIndices::Leptospirosis(compute_leptospirosis_indices(l))
        }
    }
}

/// Without both a store and an owner the cycle only computes.
pub async fn run_cycle<S>(
    store: Option<&S>,
    owner: Option<Uuid>,
    sample: SurveySample,
) -> CycleOutcome
where
    S: IndexStore + Sync + ?Sized,
{
    for (field, raw) in sample.invalid_fields() {
        tracing::debug!(field, raw, "counter is not a count; treated as absent");
    }

    let indices = compute(&sample);
    let persistence = match (store, owner) {
        (Some(store), Some(owner)) if !indices.is_empty() => Some(
            persist_computed_indices(store, owner, &indices, &sample, Utc::now()).await,
        ),
        (Some(_), Some(_)) => None,
        _ => {
            tracing::info!(disease = %sample.disease(), "compute only; indices not saved");
            None
        }
    };

    CycleOutcome {
        sample,
        indices,
        persistence,
    }
}

/// One CSV row per cycle. Cells for the other disease are ignored.
#[derive(Debug, Deserialize)]
struct SurveyRow {
    disease: String,
    houses_inspected: Option<String>,
    houses_with_larvae: Option<String>,
    containers_inspected: Option<String>,
    containers_with_larvae: Option<String>,
    positive_containers: Option<String>,
    locations_inspected: Option<String>,
    locations_with_rodents: Option<String>,
    total_rodents_caught: Option<String>,
    infected_rodents: Option<String>,
}

impl SurveyRow {
    fn into_sample(self) -> anyhow::Result<SurveySample> {
        let sample = match self.disease.parse::<Disease>()? {
            Disease::Malaria => SurveySample::Malaria(MalariaSample::validate(&MalariaInput {
                houses_inspected: self.houses_inspected,
                houses_with_larvae: self.houses_with_larvae,
                containers_inspected: self.containers_inspected,
                containers_with_larvae: self.containers_with_larvae,
                positive_containers: self.positive_containers,
            })),
            Disease::Leptospirosis => {
                SurveySample::Leptospirosis(LeptospirosisSample::validate(&LeptospirosisInput {
                    locations_inspected: self.locations_inspected,
                    locations_with_rodents: self.locations_with_rodents,
                    total_rodents_caught: self.total_rodents_caught,
                    infected_rodents: self.infected_rodents,
                }))
            }
        };
        Ok(sample)
    }
}

pub fn read_survey_csv<R: std::io::Read>(reader: R) -> anyhow::Result<Vec<SurveySample>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut samples = Vec::new();
    for (line, result) in reader.deserialize::<SurveyRow>().enumerate() {
        let row = result?;
        let sample = row
            .into_sample()
            .map_err(|err| anyhow::anyhow!("row {}: {err}", line + 1))?;
        samples.push(sample);
    }

    Ok(samples)
}

pub fn read_survey_file(path: &Path) -> anyhow::Result<Vec<SurveySample>> {
    let file = std::fs::File::open(path)?;
    read_survey_csv(file)
}
