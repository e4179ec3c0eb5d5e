use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A named data column of a category and the provider series ("filter") backing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub filter: u32,
}

const fn col(name: &'static str, filter: u32) -> Column {
    Column { name, filter }
}

const PRODUCTION: &[Column] = &[
    col("biomass", 4066),
    col("hydro", 1226),
    col("wind_offshore", 1225),
    col("wind_onshore", 4067),
    col("photovoltaics", 4068),
    col("other_renewable", 1228),
    col("nuclear", 1224),
    col("lignite", 1223),
    col("hard_coal", 4069),
    col("natural_gas", 4071),
    col("pumped_storage", 4070),
    col("other_conventional", 1227),
];

const PRODUCTION_FORECAST: &[Column] = &[
    col("total", 122),
    col("wind_offshore", 3791),
    col("wind_onshore", 123),
    col("photovoltaics", 125),
    col("wind_and_photovoltaics", 5097),
    col("other", 715),
];

const CONSUMPTION: &[Column] = &[
    col("total", 410),
    col("residual_load", 4359),
    col("pumped_storage", 4387),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Production,
    ProductionForecast,
    Consumption,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::Production,
        Category::ProductionForecast,
        Category::Consumption,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Production => "production",
            Category::ProductionForecast => "production_forecast",
            Category::Consumption => "consumption",
        }
    }

    pub fn columns(self) -> &'static [Column] {
        match self {
            Category::Production => PRODUCTION,
            Category::ProductionForecast => PRODUCTION_FORECAST,
            Category::Consumption => CONSUMPTION,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown category '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.name() == s.trim())
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
