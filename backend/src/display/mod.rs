//! Display state: live vs. pinned view, the alert overlay and the
//! countdown that ends a pin.

pub mod controller;
pub mod countdown;
pub mod view;

pub use controller::{DisplayController, DisplayMode, TickOutcome};
pub use countdown::{CountdownTimer, TimerGeneration};
pub use view::{AlertView, DisplaySnapshot, DisplaySource, QuakeView, RecentEntry};
