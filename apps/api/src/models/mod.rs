pub mod document;
pub mod profile;
pub mod progress;
pub mod readiness;
pub mod roadmap;
