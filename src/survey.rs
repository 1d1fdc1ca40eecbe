//! Raw field-survey counts and their validation.
//!
//! Every counter is kept as a tri-state so that a legitimate zero is never
//! confused with a blank or unparseable field.

use serde_json::{json, Value};

use crate::models::Disease;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Counter {
    /// Field left blank.
    Absent,
    /// Field filled with something that is not a non-negative integer.
    Invalid(String),
    Value(u64),
}

impl Counter {
    pub fn value(&self) -> Option<u64> {
        match self {
            Counter::Value(v) => Some(*v),
            Counter::Absent | Counter::Invalid(_) => None,
        }
    }

    pub fn is_present(&self) -> bool {
        self.value().is_some()
    }

    fn to_json(&self) -> Value {
        match self.value() {
            Some(v) => json!(v),
            None => Value::Null,
        }
    }
}

pub fn parse_counter(raw: &str) -> Counter {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Counter::Absent;
    }

    match trimmed.parse::<u64>() {
        Ok(v) => Counter::Value(v),
        Err(_) => Counter::Invalid(trimmed.to_string()),
    }
}

fn parse_optional(raw: Option<&str>) -> Counter {
    raw.map_or(Counter::Absent, parse_counter)
}

/// Text exactly as entered for a malaria larval survey.
#[derive(Debug, Clone, Default)]
pub struct MalariaInput {
    pub houses_inspected: Option<String>,
    pub houses_with_larvae: Option<String>,
    pub containers_inspected: Option<String>,
    pub containers_with_larvae: Option<String>,
    pub positive_containers: Option<String>,
}

/// Text exactly as entered for a leptospirosis rodent survey.
#[derive(Debug, Clone, Default)]
pub struct LeptospirosisInput {
    pub locations_inspected: Option<String>,
    pub locations_with_rodents: Option<String>,
    pub total_rodents_caught: Option<String>,
    pub infected_rodents: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalariaSample {
    pub houses_inspected: Counter,
    pub houses_with_larvae: Counter,
    pub containers_inspected: Counter,
    pub containers_with_larvae: Counter,
    pub positive_containers: Counter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MalariaComputable {
    pub house_index: bool,
    pub container_index: bool,
    pub breteau_index: bool,
}

impl MalariaSample {
    pub fn validate(input: &MalariaInput) -> Self {
        Self {
            houses_inspected: parse_optional(input.houses_inspected.as_deref()),
            houses_with_larvae: parse_optional(input.houses_with_larvae.as_deref()),
            containers_inspected: parse_optional(input.containers_inspected.as_deref()),
            containers_with_larvae: parse_optional(input.containers_with_larvae.as_deref()),
            positive_containers: parse_optional(input.positive_containers.as_deref()),
        }
    }

    pub fn computable(&self) -> MalariaComputable {
        MalariaComputable {
            house_index: self.houses_with_larvae.is_present() && self.houses_inspected.is_present(),
            container_index: self.containers_with_larvae.is_present()
                && self.containers_inspected.is_present(),
            breteau_index: self.positive_containers.is_present()
                && self.houses_inspected.is_present(),
        }
    }

    pub fn snapshot(&self) -> Value {
        json!({
            "housesInspected": self.houses_inspected.to_json(),
            "housesWithLarvae": self.houses_with_larvae.to_json(),
            "containersInspected": self.containers_inspected.to_json(),
            "containersWithLarvae": self.containers_with_larvae.to_json(),
            "positiveContainers": self.positive_containers.to_json(),
        })
    }

    fn invalid_fields(&self) -> Vec<(&'static str, &str)> {
        invalid_of(&[
            ("housesInspected", &self.houses_inspected),
            ("housesWithLarvae", &self.houses_with_larvae),
            ("containersInspected", &self.containers_inspected),
            ("containersWithLarvae", &self.containers_with_larvae),
            ("positiveContainers", &self.positive_containers),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeptospirosisSample {
    pub locations_inspected: Counter,
    pub locations_with_rodents: Counter,
    pub total_rodents_caught: Counter,
    pub infected_rodents: Counter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LeptospirosisComputable {
    pub rodent_index: bool,
    pub infection_rate: bool,
}

impl LeptospirosisSample {
    pub fn validate(input: &LeptospirosisInput) -> Self {
        Self {
            locations_inspected: parse_optional(input.locations_inspected.as_deref()),
            locations_with_rodents: parse_optional(input.locations_with_rodents.as_deref()),
            total_rodents_caught: parse_optional(input.total_rodents_caught.as_deref()),
            infected_rodents: parse_optional(input.infected_rodents.as_deref()),
        }
    }

    pub fn computable(&self) -> LeptospirosisComputable {
        LeptospirosisComputable {
            rodent_index: self.locations_with_rodents.is_present()
                && self.locations_inspected.is_present(),
            infection_rate: self.infected_rodents.is_present()
                && self.total_rodents_caught.is_present(),
        }
    }

    pub fn snapshot(&self) -> Value {
        json!({
            "locationsInspected": self.locations_inspected.to_json(),
            "locationsWithRodents": self.locations_with_rodents.to_json(),
            "totalRodentsCaught": self.total_rodents_caught.to_json(),
            "infectedRodents": self.infected_rodents.to_json(),
        })
    }

    fn invalid_fields(&self) -> Vec<(&'static str, &str)> {
        invalid_of(&[
            ("locationsInspected", &self.locations_inspected),
            ("locationsWithRodents", &self.locations_with_rodents),
            ("totalRodentsCaught", &self.total_rodents_caught),
            ("infectedRodents", &self.infected_rodents),
        ])
    }
}

fn invalid_of<'a>(fields: &[(&'static str, &'a Counter)]) -> Vec<(&'static str, &'a str)> {
    fields
        .iter()
        .filter_map(|&(name, counter)| match counter {
            Counter::Invalid(raw) => Some((name, raw.as_str())),
            _ => None,
        })
        .collect()
}

/// One validated sample, held only for the duration of a calculation cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurveySample {
    Malaria(MalariaSample),
    Leptospirosis(LeptospirosisSample),
}

impl SurveySample {
    pub fn disease(&self) -> Disease {
        match self {
            SurveySample::Malaria(_) => Disease::Malaria,
            SurveySample::Leptospirosis(_) => Disease::Leptospirosis,
        }
    }

    pub fn snapshot(&self) -> Value {
        match self {
            SurveySample::Malaria(sample) => sample.snapshot(),
            SurveySample::Leptospirosis(sample) => sample.snapshot(),
        }
    }

    /// Fields that were filled in but could not be read as counts.
    pub fn invalid_fields(&self) -> Vec<(&'static str, &str)> {
        match self {
            SurveySample::Malaria(sample) => sample.invalid_fields(),
            SurveySample::Leptospirosis(sample) => sample.invalid_fields(),
        }
    }
}
