use serde::Serialize;

use crate::models::IndexType;
use crate::risk::{classify_rodent_index, RiskLevel};
use crate::survey::{LeptospirosisSample, MalariaSample};

/// `numerator / denominator * 100`, rounded half-up to two decimals.
///
/// Works on the exact rational so that the same counts always give the same
/// bits, and halves such as 0.125 round up instead of falling to float error.
/// Returns `None` when either count is missing or the denominator is zero.
pub fn percentage(numerator: Option<u64>, denominator: Option<u64>) -> Option<f64> {
    let numerator = u128::from(numerator?);
    let denominator = u128::from(denominator?);
    if denominator == 0 {
        return None;
    }

    let hundredths = (numerator * 20_000 + denominator) / (2 * denominator);
    Some(hundredths as f64 / 100.0)
}

pub fn house_index(houses_with_larvae: Option<u64>, houses_inspected: Option<u64>) -> Option<f64> {
    percentage(houses_with_larvae, houses_inspected)
}

pub fn container_index(
    containers_with_larvae: Option<u64>,
    containers_inspected: Option<u64>,
) -> Option<f64> {
    percentage(containers_with_larvae, containers_inspected)
}

/// Positive containers per 100 houses; the denominator is the house count.
pub fn breteau_index(positive_containers: Option<u64>, houses_inspected: Option<u64>) -> Option<f64> {
    percentage(positive_containers, houses_inspected)
}

pub fn rodent_index(
    locations_with_rodents: Option<u64>,
    locations_inspected: Option<u64>,
) -> Option<f64> {
    percentage(locations_with_rodents, locations_inspected)
}

pub fn infection_rate(infected_rodents: Option<u64>, total_rodents_caught: Option<u64>) -> Option<f64> {
    percentage(infected_rodents, total_rodents_caught)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MalariaIndices {
    pub house_index: Option<f64>,
    pub container_index: Option<f64>,
    pub breteau_index: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeptospirosisIndices {
    pub rodent_index: Option<f64>,
    pub infection_rate: Option<f64>,
    pub risk_level: Option<RiskLevel>,
}

/// Indices from one cycle, in the order they are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ComputedIndices {
    Malaria(MalariaIndices),
    Leptospirosis(LeptospirosisIndices),
}

impl ComputedIndices {
    pub fn values(&self) -> Vec<(IndexType, f64)> {
        let candidates = match self {
            ComputedIndices::Malaria(m) => vec![
                (IndexType::HouseIndex, m.house_index),
                (IndexType::ContainerIndex, m.container_index),
                (IndexType::BreteauIndex, m.breteau_index),
            ],
            ComputedIndices::Leptospirosis(l) => vec![
                (IndexType::RodentIndex, l.rodent_index),
                (IndexType::InfectionRate, l.infection_rate),
            ],
        };

        candidates
            .into_iter()
            .filter_map(|(index_type, value)| value.map(|v| (index_type, v)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }
}

pub fn compute_malaria_indices(sample: &MalariaSample) -> MalariaIndices {
    let houses = sample.houses_inspected.value();
    MalariaIndices {
        house_index: house_index(sample.houses_with_larvae.value(), houses),
        container_index: container_index(
            sample.containers_with_larvae.value(),
            sample.containers_inspected.value(),
        ),
        breteau_index: breteau_index(sample.positive_containers.value(), houses),
    }
}

pub fn compute_leptospirosis_indices(sample: &LeptospirosisSample) -> LeptospirosisIndices {
    let rodent = rodent_index(
        sample.locations_with_rodents.value(),
        sample.locations_inspected.value(),
    );
    LeptospirosisIndices {
        rodent_index: rodent,
        infection_rate: infection_rate(
            sample.infected_rodents.value(),
            sample.total_rodents_caught.value(),
        ),
        risk_level: rodent.map(classify_rodent_index),
    }
}
