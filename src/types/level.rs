/// Hierarchy level the aggregator groups intersections by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Region,  // Administrative region, keyed by its identifier
    Country, // Country, keyed by the region identifier's prefix
}

impl Level {
    pub const ALL: [Level; 2] = [Level::Region, Level::Country];

    pub fn to_str(&self) -> &'static str {
        match self {
            Level::Region => "region",
            Level::Country => "country",
        }
    }
}

/// Statistic computed per group and variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistic {
    Sum,
    Average,
}

impl Statistic {
    pub const ALL: [Statistic; 2] = [Statistic::Average, Statistic::Sum];

    /// Output column prefix, e.g. `weighted_avg_` + variable.
    pub fn column_prefix(&self) -> &'static str {
        match self {
            Statistic::Sum => "weighted_sum_",
            Statistic::Average => "weighted_avg_",
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            Statistic::Sum => "sums",
            Statistic::Average => "avgs",
        }
    }
}
