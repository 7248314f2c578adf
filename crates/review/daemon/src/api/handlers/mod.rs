//! API request handlers

mod checklists;
mod deliverables;
mod events;
mod health;
mod levels;
mod workflows;

pub use checklists::*;
pub use deliverables::*;
pub use events::*;
pub use health::*;
pub use levels::*;
pub use workflows::*;
