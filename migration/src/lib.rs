pub use sea_orm_migration::prelude::*;

mod m20260901_000001_identity;
mod m20260901_000002_organisation;
mod m20260901_000003_performance;
mod m20260901_000004_work;
mod m20260901_000005_leave;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260901_000001_identity::Migration),
            Box::new(m20260901_000002_organisation::Migration),
            Box::new(m20260901_000003_performance::Migration),
            Box::new(m20260901_000004_work::Migration),
            Box::new(m20260901_000005_leave::Migration),
        ]
    }
}

/// Role names seeded by the identity migration.
pub const ROLE_NAMES: [(&str, &str); 4] = [
    ("MANAGEMENT", "Approves long employee leaves and all manager/HR leaves"),
    ("MANAGER", "Leads a department and approves short employee leaves"),
    ("EMPLOYEE", "Regular staff member"),
    ("HR", "Maintains staff records and entitlements"),
];
