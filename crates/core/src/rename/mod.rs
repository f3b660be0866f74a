//! Filename generation: templates, output-path planning, and conflict
//! resolution.

pub mod conflict;
pub mod planner;
pub mod template;

pub use conflict::{ConflictPrompt, ConflictStrategy, PromptChoice, resolve_conflicts};
pub use planner::{ExtractMode, FilenamePlan, NamingOptions, PlanEntry, plan_filenames};
pub use template::Template;
