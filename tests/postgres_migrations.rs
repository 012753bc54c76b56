use anyhow::{Context, Result};
use hr_tests::{POSTGRES_PORT, database_url, postgres_image};
use migration::{Migrator, MigratorTrait, ROLE_NAMES};
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Statement};
use testcontainers::clients::Cli;
use uuid::Uuid;

const TABLES: [&str; 16] = [
    "roles",
    "users",
    "refresh_tokens",
    "departments",
    "designations",
    "staff",
    "associations",
    "kmis",
    "kpis",
    "kais",
    "goals",
    "milestones",
    "tasks",
    "tickets",
    "leaves",
    "leave_entitlements",
];

#[tokio::test]
#[ignore = "requires docker"]
async fn migrations_apply_enforce_constraints_and_reset() -> Result<()> {
    let docker = Cli::default();
    let container = docker.run(postgres_image());
    let url = database_url(container.get_host_port_ipv4(POSTGRES_PORT));
    let pool = Database::connect(&url).await?;

    Migrator::up(&pool, None).await?;
    assert!(Migrator::get_pending_migrations(&pool).await?.is_empty());
    for table in TABLES {
        assert!(table_exists(&pool, table).await?, "{table} missing");
    }
    assert_eq!(
        scalar(&pool, "SELECT COUNT(*) FROM roles").await?,
        ROLE_NAMES.len() as i64
    );

    let user = Uuid::new_v4();
    exec(
        &pool,
        &format!(
            "INSERT INTO users (id, email, password_hash, role_id, created_at, updated_at) \
             SELECT '{user}', 'pg@hr.example.test', 'x', id, now(), now() FROM roles WHERE name = 'EMPLOYEE'"
        ),
    )
    .await?;

    let inverted = exec(
        &pool,
        &format!(
            "INSERT INTO leaves (id, user_id, leave_type, from_date, to_date, credited_days, reason, \
             approver_role, created_at, updated_at) VALUES ('{}', '{user}', 'CASUAL', '2026-05-10', \
             '2026-05-09', 1, 'inverted', 'MANAGER', now(), now())",
            Uuid::new_v4()
        ),
    )
    .await;
    assert!(inverted.is_err(), "from_date after to_date must be rejected");

    let entitlement = |id: Uuid| {
        format!(
            "INSERT INTO leave_entitlements (id, user_id, year, entitled_days, created_at, updated_at) \
             VALUES ('{id}', '{user}', 2026, 24, now(), now())"
        )
    };
    exec(&pool, &entitlement(Uuid::new_v4())).await?;
    assert!(
        exec(&pool, &entitlement(Uuid::new_v4())).await.is_err(),
        "one entitlement row per user and year"
    );
    assert_eq!(
        scalar(&pool, "SELECT accumulated_days::bigint FROM leave_entitlements").await?,
        0
    );

    exec(&pool, &format!("DELETE FROM users WHERE id = '{user}'")).await?;
    assert_eq!(
        scalar(&pool, "SELECT COUNT(*) FROM leave_entitlements").await?,
        0,
        "entitlements cascade with their user"
    );

    Migrator::reset(&pool).await?;
    for table in TABLES {
        assert!(!table_exists(&pool, table).await?, "{table} survived reset");
    }
    Ok(())
}

async fn exec(pool: &DatabaseConnection, sql: &str) -> Result<()> {
    pool.execute(Statement::from_string(DatabaseBackend::Postgres, sql.to_string()))
        .await?;
    Ok(())
}

async fn scalar(pool: &DatabaseConnection, sql: &str) -> Result<i64> {
    let row = pool
        .query_one(Statement::from_string(DatabaseBackend::Postgres, sql.to_string()))
        .await?
        .context("query returned no rows")?;
    Ok(row.try_get_by_index::<i64>(0)?)
}

async fn table_exists(pool: &DatabaseConnection, table: &str) -> Result<bool> {
    let sql = format!(
        "SELECT COUNT(*) FROM information_schema.tables \
         WHERE table_schema = 'public' AND table_name = '{table}'"
    );
    Ok(scalar(pool, &sql).await? == 1)
}
