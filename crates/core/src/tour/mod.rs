pub mod filter;
pub mod pipeline;
pub mod schema;
pub mod slug;

pub use filter::{CompareOp, FilterValue, TourCondition, TourField, TourFilter, VisibleFilter};
pub use pipeline::{Stage, VisiblePipeline};
pub use schema::{Difficulty, NewTour, TourDraft, TourPatch};
pub use slug::slugify;
