pub mod associations;
pub mod departments;
pub mod designations;
pub mod goals;
pub mod kais;
pub mod kmis;
pub mod kpis;
pub mod leave_entitlements;
pub mod leaves;
pub mod milestones;
pub mod refresh_tokens;
pub mod roles;
pub mod staff;
pub mod tasks;
pub mod tickets;
pub mod users;
