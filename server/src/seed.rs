//! Demo fixtures: two departments, one user per role, a small indicator tree.

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use entity::{
    associations, departments, designations, kais, kmis, kpis, leave_entitlements, staff, users,
};
use platform_authz::Role;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use crate::routes::{now, today};

pub const DEMO_DOMAIN: &str = "hr.example.test";

#[derive(Clone, Debug)]
pub struct SeededUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

#[derive(Clone, Debug)]
pub struct SeedReport {
    pub management: SeededUser,
    pub manager: SeededUser,
    pub employee: SeededUser,
    /// Employee in People Ops, outside the manager's department.
    pub analyst: SeededUser,
    pub hr: SeededUser,
    pub engineering: Uuid,
    pub people_ops: Uuid,
    pub kmi: Uuid,
    pub kpi: Uuid,
    pub kai: Uuid,
}

/// Inserts the demo data. Returns `None` when it is already present.
pub async fn seed_demo(db: &DatabaseConnection, password: &str) -> Result<Option<SeedReport>> {
    let marker = format!("management@{DEMO_DOMAIN}");
    let existing = users::Entity::find()
        .filter(users::Column::Email.eq(marker))
        .one(db)
        .await?;
    if existing.is_some() {
        info!("demo data already present; skipping seed");
        return Ok(None);
    }

    let password_hash = platform_authn::hash_password(password)?;
    let role_ids = entity::roles::Entity::find().all(db).await?;
    let role_id = |role: Role| {
        role_ids
            .iter()
            .find(|row| row.name == role.as_str())
            .map(|row| row.id)
            .with_context(|| format!("role {role} missing; run migrations first"))
    };

    let txn = db.begin().await?;
    let stamp = now();
    let year = today().year();

    let engineering = insert_department(&txn, "Engineering", "Product and platform teams").await?;
    let people_ops = insert_department(&txn, "People Ops", "HR and administration").await?;
    let engineer_title = designations::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set("Software Engineer".into()),
        department_id: Set(Some(engineering)),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&txn)
    .await?
    .id;

    let people = [
        ("management", Role::Management, "Maya", "Director", None),
        ("manager", Role::Manager, "Marco", "Lead", Some(engineering)),
        ("employee", Role::Employee, "Eli", "Engineer", Some(engineering)),
        ("analyst", Role::Employee, "Ana", "Analyst", Some(people_ops)),
        ("hr", Role::Hr, "Hana", "Partner", Some(people_ops)),
    ];
    let mut seeded = Vec::with_capacity(people.len());
    for (handle, role, first_name, last_name, department) in people {
        let user = users::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(format!("{handle}@{DEMO_DOMAIN}")),
            password_hash: Set(password_hash.clone()),
            role_id: Set(role_id(role)?),
            is_active: Set(true),
            created_at: Set(stamp),
            updated_at: Set(stamp),
        }
        .insert(&txn)
        .await?;
        staff::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.id),
            first_name: Set(first_name.into()),
            last_name: Set(last_name.into()),
            phone: Set(None),
            date_of_birth: Set(None),
            date_of_joining: Set(NaiveDate::from_ymd_opt(year - 1, 1, 15).unwrap_or_else(today)),
            address: Set(None),
            created_at: Set(stamp),
            updated_at: Set(stamp),
        }
        .insert(&txn)
        .await?;
        if let Some(department_id) = department {
            let designation = (department_id == engineering && role == Role::Employee)
                .then_some(engineer_title);
            associations::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.id),
                department_id: Set(department_id),
                designation_id: Set(designation),
                created_at: Set(stamp),
            }
            .insert(&txn)
            .await?;
        }
        seeded.push(SeededUser {
            id: user.id,
            email: user.email,
            role,
        });
    }
    let [management, manager, employee, analyst, hr]: [SeededUser; 5] = seeded
        .try_into()
        .map_err(|_| anyhow::anyhow!("unexpected seed user count"))?;

    leave_entitlements::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(employee.id),
        year: Set(year),
        entitled_days: Set(24),
        accumulated_days: Set(2),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&txn)
    .await?;

    let kmi = kmis::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set("Customer satisfaction".into()),
        description: Set(Some("Company-wide focus for the year".into())),
        year: Set(year),
        created_by: Set(management.id),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&txn)
    .await?
    .id;
    let kpi = kpis::ActiveModel {
        id: Set(Uuid::new_v4()),
        kmi_id: Set(kmi),
        title: Set("Resolve support escalations".into()),
        description: Set(None),
        department_id: Set(Some(engineering)),
        target: Set(Some(40.0)),
        created_by: Set(manager.id),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&txn)
    .await?
    .id;
    let kai = kais::ActiveModel {
        id: Set(Uuid::new_v4()),
        kpi_id: Set(kpi),
        title: Set("Close escalations within a week".into()),
        description: Set(None),
        assigned_to: Set(Some(employee.id)),
        target: Set(Some(10.0)),
        achieved: Set(Some(0.0)),
        status: Set(kais::Status::NotStarted),
        created_by: Set(manager.id),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&txn)
    .await?
    .id;

    txn.commit().await?;
    info!(users = 5, departments = 2, "demo data seeded");
    Ok(Some(SeedReport {
        management,
        manager,
        employee,
        analyst,
        hr,
        engineering,
        people_ops,
        kmi,
        kpi,
        kai,
    }))
}

async fn insert_department<C: sea_orm::ConnectionTrait>(
    db: &C,
    name: &str,
    description: &str,
) -> Result<Uuid> {
    let stamp = now();
    let model = departments::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.into()),
        description: Set(Some(description.into())),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(db)
    .await?;
    Ok(model.id)
}
