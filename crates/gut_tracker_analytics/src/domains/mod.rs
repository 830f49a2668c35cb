//! Cross-domain analyses built on the daily rollups.
//!
//! # Modules
//!
//! - [`correlation`]: meal, symptom and medication correlations, plus
//!   before/after medication effectiveness
//! - [`trends`]: per-metric regression trends and the overall direction
//! - [`scoring`]: the weighted composite health score
//! - [`insights`]: rule-based insights and recommendations

pub mod correlation;
pub mod insights;
pub mod scoring;
pub mod trends;
