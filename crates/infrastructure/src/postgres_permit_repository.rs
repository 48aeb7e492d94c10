
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};

use permitdesk_application::PermitRepository;
use permitdesk_core::{AppError, AppResult};
use permitdesk_domain::{Permit, PermitDetails, PermitId, PermitStatus};

/// PostgreSQL-backed permit repository.
///
/// The `permit_id` primary key is the final arbiter of identifier
/// uniqueness under concurrent creates.
#[derive(Clone)]
pub struct PostgresPermitRepository {
    pool: PgPool,
}

impl PostgresPermitRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PermitRow {
    permit_id: String,
    full_name: String,
    passport_number: String,
    nationality: Option<String>,
    date_of_birth: Option<NaiveDate>,
    employer: Option<String>,
    job_title: Option<String>,
    permit_start_date: Option<NaiveDate>,
    permit_expiry_date: Option<NaiveDate>,
    status: String,
    image: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const PERMIT_COLUMNS: &str = "permit_id, full_name, passport_number, nationality, date_of_birth, \
     employer, job_title, permit_start_date, permit_expiry_date, status, image, \
     created_at, updated_at";

fn permit_from_row(row: PermitRow) -> AppResult<Permit> {
    let details = PermitDetails {
        nationality: row.nationality,
        date_of_birth: row.date_of_birth,
        employer: row.employer,
        job_title: row.job_title,
        permit_start_date: row.permit_start_date,
        permit_expiry_date: row.permit_expiry_date,
    };

    Permit::from_parts(
        PermitId::parse(row.permit_id)?,
        row.full_name,
        row.passport_number,
        details,
        PermitStatus::parse(&row.status)?,
        row.image,
        row.created_at,
        row.updated_at,
    )
}

fn escape_like_pattern(filter: &str) -> String {
    let mut escaped = String::with_capacity(filter.len() + 2);
    for character in filter.chars() {
        if matches!(character, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(character);
    }

    format!("%{escaped}%")
}

#[async_trait]
impl PermitRepository for PostgresPermitRepository {
    async fn create_permit(&self, permit: &Permit) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO permits (permit_id, full_name, passport_number, nationality,
                date_of_birth, employer, job_title, permit_start_date, permit_expiry_date,
                status, image, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(permit.permit_id().as_str())
        .bind(permit.full_name())
        .bind(permit.passport_number())
        .bind(permit.details().nationality.as_deref())
        .bind(permit.details().date_of_birth)
        .bind(permit.details().employer.as_deref())
        .bind(permit.details().job_title.as_deref())
        .bind(permit.details().permit_start_date)
        .bind(permit.details().permit_expiry_date)
        .bind(permit.status().as_str())
        .bind(permit.image())
        .bind(permit.created_at())
        .bind(permit.updated_at())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) => {
                if let sqlx::Error::Database(database_error) = &error
                    && database_error.code().as_deref() == Some("23505")
                {
                    return Err(AppError::Conflict(format!(
                        "permit '{}' already exists",
                        permit.permit_id()
                    )));
                }

                Err(AppError::Internal(format!(
                    "failed to create permit '{}': {error}",
                    permit.permit_id()
                )))
            }
        }
    }

    async fn permit_id_exists(&self, permit_id: &PermitId) -> AppResult<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM permits WHERE permit_id = $1)")
            .bind(permit_id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to check permit id '{permit_id}': {error}"
                ))
            })
    }

    async fn find_by_permit_id(&self, permit_id: &str) -> AppResult<Option<Permit>> {
        let row: Option<PermitRow> = sqlx::query_as(&format!(
            "SELECT {PERMIT_COLUMNS} FROM permits WHERE permit_id = $1"
        ))
        .bind(permit_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load permit '{permit_id}': {error}"))
        })?;

        row.map(permit_from_row).transpose()
    }

    async fn find_by_permit_id_or_passport(&self, query: &str) -> AppResult<Option<Permit>> {
        let row: Option<PermitRow> = sqlx::query_as(&format!(
            r#"
            SELECT {PERMIT_COLUMNS} FROM permits
            WHERE permit_id = $1 OR passport_number = $1
            ORDER BY (permit_id = $1) DESC, created_at DESC
            LIMIT 1
            "#
        ))
        .bind(query)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to search permit '{query}': {error}"))
        })?;

        row.map(permit_from_row).transpose()
    }

    async fn list_permits(
        &self,
        filter: Option<&str>,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Permit>, i64)> {
        let pattern = filter.map(escape_like_pattern);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM permits
            WHERE $1::TEXT IS NULL
               OR full_name ILIKE $1
               OR passport_number ILIKE $1
               OR employer ILIKE $1
               OR job_title ILIKE $1
            "#,
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count permits: {error}")))?;

        let rows: Vec<PermitRow> = sqlx::query_as(&format!(
            r#"
            SELECT {PERMIT_COLUMNS} FROM permits
            WHERE $1::TEXT IS NULL
               OR full_name ILIKE $1
               OR passport_number ILIKE $1
               OR employer ILIKE $1
               OR job_title ILIKE $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list permits: {error}")))?;

        let permits = rows
            .into_iter()
            .map(permit_from_row)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((permits, total))
    }

    async fn update_permit(&self, permit: &Permit) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE permits
            SET full_name = $2,
                passport_number = $3,
                nationality = $4,
                date_of_birth = $5,
                employer = $6,
                job_title = $7,
                permit_start_date = $8,
                permit_expiry_date = $9,
                status = $10,
                image = $11,
                updated_at = $12
            WHERE permit_id = $1
            "#,
        )
        .bind(permit.permit_id().as_str())
        .bind(permit.full_name())
        .bind(permit.passport_number())
        .bind(permit.details().nationality.as_deref())
        .bind(permit.details().date_of_birth)
        .bind(permit.details().employer.as_deref())
        .bind(permit.details().job_title.as_deref())
        .bind(permit.details().permit_start_date)
        .bind(permit.details().permit_expiry_date)
        .bind(permit.status().as_str())
        .bind(permit.image())
        .bind(permit.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to update permit '{}': {error}",
                permit.permit_id()
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "permit '{}' does not exist",
                permit.permit_id()
            )));
        }

        Ok(())
    }

    async fn delete_permit(&self, permit_id: &str) -> AppResult<Permit> {
        let row: Option<PermitRow> = sqlx::query_as(&format!(
            "DELETE FROM permits WHERE permit_id = $1 RETURNING {PERMIT_COLUMNS}"
        ))
        .bind(permit_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to delete permit '{permit_id}': {error}"))
        })?;

        row.map(permit_from_row)
            .transpose()?
            .ok_or_else(|| AppError::NotFound(format!("permit '{permit_id}' does not exist")))
    }
}
