mod level;
mod region_id;

pub use level::{Level, Statistic};
pub use region_id::{country_codes, RegionId, COUNTRY_PREFIX_LEN};
