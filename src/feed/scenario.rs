use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::graph::Measurement;

/// Canned measurement sets for demos and regression runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scenario {
    Pair,
    Triangle,
    ViolatedTriangle,
    SimpleTriangle,
    Square,
    Star,
    MixedRanges,
}

#[derive(Debug, Error)]
#[error("unknown scenario '{0}'")]
pub struct UnknownScenario(String);

impl Scenario {
    pub const ALL: [Self; 7] = [
        Self::Pair,
        Self::Triangle,
        Self::ViolatedTriangle,
        Self::SimpleTriangle,
        Self::Square,
        Self::Star,
        Self::MixedRanges,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Pair => "pair",
            Self::Triangle => "triangle",
            Self::ViolatedTriangle => "violated-triangle",
            Self::SimpleTriangle => "simple-triangle",
            Self::Square => "square",
            Self::Star => "star",
            Self::MixedRanges => "mixed-ranges",
        }
    }

    pub fn measurements(self) -> Vec<Measurement> {
        let triples: &[(&str, &str, f32)] = match self {
            Self::Pair => &[("A", "B", 2.0)],
            Self::Triangle => &[("A", "B", 2.0), ("B", "C", 3.0), ("A", "C", 4.0)],
            Self::ViolatedTriangle => &[("A", "B", 2.0), ("B", "C", 3.0), ("A", "C", 10.0)],
            Self::SimpleTriangle => &[
                ("B5A4", "Room1", 2.0),
                ("B5A4", "Room2", 3.0),
                ("Room1", "Room2", 2.5),
            ],
            Self::Square => &[
                ("A", "B", 2.0),
                ("B", "C", 2.0),
                ("C", "D", 2.0),
                ("D", "A", 2.0),
                ("A", "C", 2.83),
                ("B", "D", 2.83),
            ],
            Self::Star => &[
                ("Gateway", "Node1", 1.5),
                ("Gateway", "Node2", 2.0),
                ("Gateway", "Node3", 2.5),
                ("Gateway", "Node4", 1.8),
                ("Gateway", "Node5", 2.2),
            ],
            Self::MixedRanges => &[
                ("B5A4", "Close", 0.5),
                ("B5A4", "Medium", 5.0),
                ("B5A4", "Far", 10.0),
                ("Close", "Medium", 4.8),
                ("Medium", "Far", 6.2),
            ],
        };

        triples
            .iter()
            .map(|&(id_a, id_b, distance_m)| Measurement::new(id_a, id_b, distance_m))
            .collect()
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = UnknownScenario;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.name() == value)
            .ok_or_else(|| UnknownScenario(value.to_owned()))
    }
}
