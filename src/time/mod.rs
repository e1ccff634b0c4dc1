pub mod buckets;
pub mod clock;

pub use buckets::{align_down, fifteen_second_bucket, second_bucket};
pub use clock::{Clock, ManualClock, SystemClock};
