mod compensation;
mod pipeline;

pub use compensation::{Compensation, UndoAction};
pub use pipeline::{ProvisioningPipeline, ranked_perks};
