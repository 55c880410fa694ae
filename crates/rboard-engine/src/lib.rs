//! Storyboard generation core.
//!
//! The deterministic orchestration logic of the storyboard pipeline:
//! - [`registry`]: named visual assets, scoped pools, tag/name resolution
//! - [`planner`]: staged script analysis producing ordered shot plans
//! - [`refs`]: reference-image selection, budgeting and tag remapping
//! - [`continuity`]: advisory rule engine over the ordered shot list
//! - [`render`]: sequential shot rendering against the image capability
//!
//! External capabilities (text understanding, image generation, media
//! persistence) are consumed through the traits in `rboard-ai` and
//! `rboard-store`; nothing here retries a failed capability call.

pub mod continuity;
pub mod error;
pub mod planner;
pub mod prompts;
pub mod refs;
pub mod registry;
pub mod render;

pub use continuity::{apply_fix, check_continuity};
pub use error::{EngineError, EngineResult};
pub use planner::{PlanOutcome, ShotAnchors, ShotPlanner};
pub use refs::{
    resolve_references, ReferenceImage, ResolvedReferences, MAX_REFERENCE_IMAGES, REF_MASTER,
    REF_PREVIOUS,
};
pub use registry::EntityRegistry;
pub use render::{EditedShot, RenderedShot, ShotRenderResult, ShotRenderer};
