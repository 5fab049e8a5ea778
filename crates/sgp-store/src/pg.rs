//! Postgres-backed collaborators (sqlx).

use std::collections::HashMap;

use anyhow::{Context, Result};
use futures_util::stream::{BoxStream, StreamExt};
use serde_json::Value;
use sgp_schemas::{CourseSchedule, Enrollment, Record};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::{CourseCatalog, EnrollmentSource, ScoreStore};

pub const ENV_DB_URL: &str = "SGP_DATABASE_URL";

/// Connect to Postgres using SGP_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_scores_table: bool,
}

/// Connectivity + schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='scores'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_scores_table: exists,
    })
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgScoreStore {
    pool: PgPool,
}

impl PgScoreStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: &PgRow) -> Result<Record> {
    Ok(Record {
        item_id: row.try_get("item_id")?,
        user_id: row.try_get("user_id")?,
        grade: row.try_get("grade")?,
        max_grade: row.try_get("max_grade")?,
        state: row.try_get("state")?,
        created_at: row.try_get("created_at")?,
        modified_at: row.try_get("modified_at")?,
    })
}

#[async_trait::async_trait]
impl ScoreStore for PgScoreStore {
    async fn get(&self, item_id: &str, user_id: &str) -> Result<Option<Record>> {
        let row = sqlx::query(
            r#"
            select item_id, user_id, grade, max_grade, state, created_at, modified_at
            from scores
            where item_id = $1 and user_id = $2
            "#,
        )
        .bind(item_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("score get failed")?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn get_many(
        &self,
        item_id: &str,
        user_ids: Option<&[String]>,
    ) -> Result<HashMap<String, Record>> {
        let rows = match user_ids {
            None => sqlx::query(
                r#"
                select item_id, user_id, grade, max_grade, state, created_at, modified_at
                from scores
                where item_id = $1
                "#,
            )
            .bind(item_id)
            .fetch_all(&self.pool)
            .await
            .context("score get_many failed")?,
            Some(ids) => sqlx::query(
                r#"
                select item_id, user_id, grade, max_grade, state, created_at, modified_at
                from scores
                where item_id = $1 and user_id = any($2)
                "#,
            )
            .bind(item_id)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await
            .context("score get_many (filtered) failed")?,
        };

        let mut out = HashMap::with_capacity(rows.len());
        for row in &rows {
            let rec = record_from_row(row)?;
            out.insert(rec.user_id.clone(), rec);
        }
        Ok(out)
    }

    async fn set(
        &self,
        item_id: &str,
        user_id: &str,
        grade: f64,
        max_grade: f64,
        state: Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            insert into scores (item_id, user_id, grade, max_grade, state, created_at, modified_at)
            values ($1, $2, $3, $4, $5, now(), now())
            on conflict (item_id, user_id) do update
            set grade = excluded.grade,
                max_grade = excluded.max_grade,
                state = excluded.state,
                modified_at = now()
            "#,
        )
        .bind(item_id)
        .bind(user_id)
        .bind(grade)
        .bind(max_grade)
        .bind(state)
        .execute(&self.pool)
        .await
        .with_context(|| format!("score upsert failed item_id={item_id} user_id={user_id}"))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgEnrollmentSource {
    pool: PgPool,
}

impl PgEnrollmentSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn enrollment_from_row(row: &PgRow) -> Result<Enrollment> {
    Ok(Enrollment {
        user_id: row.try_get("user_id")?,
        username: row.try_get("username")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        active: row.try_get("active")?,
        track: row.try_get("track")?,
        external_uid: row.try_get("external_uid")?,
    })
}

impl EnrollmentSource for PgEnrollmentSource {
    fn enrollments<'a>(&'a self, course_id: &'a str) -> BoxStream<'a, Result<Enrollment>> {
        sqlx::query(
            r#"
            select user_id, username, full_name, email, active, track, external_uid
            from enrollments
            where course_id = $1
            order by position asc, user_id asc
            "#,
        )
        .bind(course_id)
        .fetch(&self.pool)
        .map(|row| {
            let row = row.context("enrollment fetch failed")?;
            enrollment_from_row(&row)
        })
        .boxed()
    }
}

/// Insert or replace one roster entry. Used by fixtures and tooling.
pub async fn upsert_enrollment(
    pool: &PgPool,
    course_id: &str,
    position: i64,
    e: &Enrollment,
) -> Result<()> {
    sqlx::query(
        r#"
        insert into enrollments (
          course_id, user_id, position, username, full_name, email, active, track, external_uid
        ) values (
          $1, $2, $3, $4, $5, $6, $7, $8, $9
        )
        on conflict (course_id, user_id) do update
        set position = excluded.position,
            username = excluded.username,
            full_name = excluded.full_name,
            email = excluded.email,
            active = excluded.active,
            track = excluded.track,
            external_uid = excluded.external_uid
        "#,
    )
    .bind(course_id)
    .bind(&e.user_id)
    .bind(position)
    .bind(&e.username)
    .bind(&e.full_name)
    .bind(&e.email)
    .bind(e.active)
    .bind(&e.track)
    .bind(&e.external_uid)
    .execute(pool)
    .await
    .context("upsert_enrollment failed")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgCourseCatalog {
    pool: PgPool,
}

impl PgCourseCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CourseCatalog for PgCourseCatalog {
    async fn course(&self, course_id: &str) -> Result<Option<CourseSchedule>> {
        let row = sqlx::query(
            r#"
            select course_id, end_at, freeze_after_end
            from courses
            where course_id = $1
            "#,
        )
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await
        .context("course lookup failed")?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(CourseSchedule {
            course_id: row.try_get("course_id")?,
            end: row.try_get("end_at")?,
            freeze_after_end: row.try_get("freeze_after_end")?,
        }))
    }
}
