use sqlx::postgres::PgPool;
use sqlx::Executor;

/// Ordered schema migrations, embedded in the binary.
pub const MIGRATIONS: &[(&str, &str)] = &[
    ("001_organizations_doctors", MIGRATION_001),
    ("002_patients", MIGRATION_002),
    ("003_follow_ups", MIGRATION_003),
    ("004_messages", MIGRATION_004),
    ("005_scheduled_jobs", MIGRATION_005),
];

const MIGRATION_001: &str = r#"
CREATE TABLE IF NOT EXISTS organizations (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS doctors (
    id UUID PRIMARY KEY,
    organization_id UUID NOT NULL REFERENCES organizations(id),
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;

const MIGRATION_002: &str = r#"
CREATE TABLE IF NOT EXISTS patients (
    id UUID PRIMARY KEY,
    doctor_id UUID NOT NULL REFERENCES doctors(id),
    name TEXT NOT NULL,
    phone TEXT NOT NULL UNIQUE,
    preferred_contact_method TEXT NOT NULL DEFAULT 'WHATSAPP'
        CHECK (preferred_contact_method IN ('WHATSAPP', 'SMS', 'EMAIL')),
    age INTEGER NOT NULL,
    gender TEXT NOT NULL,
    blood_type TEXT NOT NULL,
    known_conditions TEXT[] NOT NULL DEFAULT '{}',
    allergies TEXT[] NOT NULL DEFAULT '{}',
    medications TEXT[] NOT NULL DEFAULT '{}',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_patients_doctor ON patients(doctor_id);
"#;

const MIGRATION_003: &str = r#"
CREATE TABLE IF NOT EXISTS follow_ups (
    seq BIGSERIAL UNIQUE,
    id UUID PRIMARY KEY,
    patient_id UUID NOT NULL REFERENCES patients(id),
    doctor_id UUID NOT NULL REFERENCES doctors(id),
    scheduled_at TIMESTAMPTZ NOT NULL,
    completed_at TIMESTAMPTZ,
    visit_summary TEXT NOT NULL,
    diagnosis TEXT NOT NULL,
    prescription TEXT NOT NULL,
    doctor_notes TEXT NOT NULL DEFAULT '',
    notes TEXT NOT NULL DEFAULT '',
    critical_flag BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE UNIQUE INDEX IF NOT EXISTS uniq_follow_ups_active_patient
    ON follow_ups(patient_id) WHERE completed_at IS NULL;
"#;

const MIGRATION_004: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    seq BIGSERIAL UNIQUE,
    id UUID PRIMARY KEY,
    patient_id UUID NOT NULL REFERENCES patients(id),
    doctor_id UUID NOT NULL REFERENCES doctors(id),
    direction TEXT NOT NULL CHECK (direction IN ('INBOUND', 'OUTBOUND')),
    channel TEXT NOT NULL CHECK (channel IN ('WHATSAPP', 'SMS')),
    content TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('SENT', 'DELIVERED', 'READ', 'FAILED')),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_messages_patient_recent
    ON messages(patient_id, created_at DESC, seq DESC);
"#;

const MIGRATION_005: &str = r#"
CREATE TABLE IF NOT EXISTS scheduled_jobs (
    id UUID PRIMARY KEY,
    job_key TEXT NOT NULL UNIQUE,
    payload JSONB NOT NULL,
    run_at TIMESTAMPTZ NOT NULL,
    state TEXT NOT NULL DEFAULT 'pending'
        CHECK (state IN ('pending', 'running', 'failed')),
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    locked_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_scheduled_jobs_due
    ON scheduled_jobs(state, run_at);
"#;

/// Apply every migration not yet recorded in `schema_migrations`.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::Error> {
    init_migrations_tracker(pool).await?;

    let mut applied = 0;
    for (name, sql) in MIGRATIONS {
        if is_applied(pool, name).await? {
            continue;
        }

        tracing::info!("Running migration: {}", name);
        let mut tx = pool.begin().await?;
        (&mut *tx).execute(*sql).await?;
        record_migration(&mut tx, name).await?;
        tx.commit().await?;
        applied += 1;
    }

    tracing::info!("✓ Migrations up to date ({} applied)", applied);
    Ok(applied)
}

/// Create the tracker table if needed
pub async fn init_migrations_tracker(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            id SERIAL PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            applied_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn is_applied(pool: &PgPool, name: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM schema_migrations WHERE name = $1)")
        .bind(name)
        .fetch_one(pool)
        .await
}

/// Record a migration as applied
pub async fn record_migration(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    name: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO schema_migrations (name) VALUES ($1) ON CONFLICT DO NOTHING")
        .bind(name)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_names_are_ordered_and_unique() {
        let names: Vec<&str> = MIGRATIONS.iter().map(|(n, _)| *n).collect();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(names, sorted);
    }

    #[test]
    fn single_active_follow_up_is_enforced_by_partial_index() {
        assert!(MIGRATION_003.contains("WHERE completed_at IS NULL"));
        assert!(MIGRATION_003.contains("UNIQUE INDEX"));
    }
}
