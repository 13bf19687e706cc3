pub mod article;
pub mod job;
pub mod resume;
pub mod skill;
