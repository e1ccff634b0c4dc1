pub mod candle_aggregator;
pub mod candle_history;
pub mod tick_buffer;
pub mod window_manager;

pub use candle_aggregator::{aggregate_candles, candle_from_ticks, CandleAggregator, Resolution};
pub use candle_history::{CandleHistory, Upsert};
pub use tick_buffer::{TickBuffer, TickWindow};
pub use window_manager::{TokenSeries, WindowManager};
