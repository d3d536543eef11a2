pub mod bar;
pub mod settings;
pub mod signal;
pub mod trade_idea;

pub use bar::{DailyBar, PriceSeries, SymbolBars};
pub use settings::{FilterMode, Settings, SideMode};
pub use signal::{Direction, InboundSignal};
pub use trade_idea::{Analysis, Decision, Side, TradeIdea, Trend};
