pub mod alert_state;
pub mod clock;
pub mod settings_store;

pub use alert_state::{AlertState, DayState, Reservation};
pub use clock::{Clock, ManualClock, SystemClock};
pub use settings_store::SettingsStore;
