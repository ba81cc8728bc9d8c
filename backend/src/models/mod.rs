pub mod event;
pub mod intensity;
pub mod macros;
pub mod time;

pub use event::*;
pub use intensity::*;
pub use time::*;
