use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres};

use fleetport_core::models::{NewVehicle, Vehicle, VehicleUpdate};
use fleetport_core::AppError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Vehicle with VIN {vin} already exists")]
    UniquenessViolation { vin: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_uniqueness_violation(&self) -> bool {
        matches!(self, StoreError::UniquenessViolation { .. })
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniquenessViolation { vin } => {
                AppError::Conflict(format!("Vehicle with VIN {} already exists", vin))
            }
            StoreError::Database(e) => AppError::Database(e),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Keyed vehicle persistence. Implementations must enforce VIN uniqueness
/// themselves; callers rely on `insert` failing with
/// [`StoreError::UniquenessViolation`] rather than checking first.
#[async_trait]
pub trait VehicleStore: Send + Sync {
    async fn insert(&self, vehicle: &NewVehicle) -> StoreResult<Vehicle>;

    async fn find_by_vin(&self, vin: &str) -> StoreResult<Option<Vehicle>>;

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<Vehicle>>;

    /// Every vehicle manufactured on or before `cutoff`, ordered by id.
    ///
    /// Age filters go through the manufacture date, never the stored
    /// `age_of_vehicle`, which is only correct on the day it was written.
    async fn find_manufactured_on_or_before(&self, cutoff: NaiveDate) -> StoreResult<Vec<Vehicle>>;

    /// Applies the non-`None` fields to the vehicle with this VIN and returns
    /// the number of rows touched (0 or 1).
    async fn update(&self, vin: &str, changes: &VehicleUpdate) -> StoreResult<u64>;

    async fn delete(&self, vehicle: &Vehicle) -> StoreResult<()>;

    /// One page ordered by id, plus the total row count.
    async fn list_page(&self, offset: i64, limit: i64) -> StoreResult<(Vec<Vehicle>, i64)>;

    /// Case-insensitive substring match on `car_model`.
    async fn search_by_model(&self, keyword: &str) -> StoreResult<Vec<Vehicle>>;
}

#[derive(Clone)]
pub struct PgVehicleStore {
    pool: PgPool,
}

impl PgVehicleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_insert_error(err: sqlx::Error, vin: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::UniquenessViolation {
                vin: vin.to_string(),
            };
        }
    }
    StoreError::Database(err)
}

/// Escapes LIKE wildcards so the keyword is matched literally.
fn like_pattern(keyword: &str) -> String {
    let escaped = keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl VehicleStore for PgVehicleStore {
    #[tracing::instrument(skip(self, vehicle), fields(vin = %vehicle.vin))]
    async fn insert(&self, vehicle: &NewVehicle) -> StoreResult<Vehicle> {
        let stored = sqlx::query_as::<Postgres, Vehicle>(
            r#"
            INSERT INTO vehicles (
                first_name, last_name, email, car_make, car_model, vin,
                manufactured_date, age_of_vehicle
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING
                id, first_name, last_name, email, car_make, car_model, vin,
                manufactured_date, age_of_vehicle, created_at
            "#,
        )
        .bind(&vehicle.first_name)
        .bind(&vehicle.last_name)
        .bind(&vehicle.email)
        .bind(&vehicle.car_make)
        .bind(&vehicle.car_model)
        .bind(&vehicle.vin)
        .bind(vehicle.manufactured_date)
        .bind(vehicle.age_of_vehicle)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &vehicle.vin))?;

        Ok(stored)
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_vin(&self, vin: &str) -> StoreResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<Postgres, Vehicle>(
            r#"
            SELECT
                id, first_name, last_name, email, car_make, car_model, vin,
                manufactured_date, age_of_vehicle, created_at
            FROM vehicles
            WHERE vin = $1
            "#,
        )
        .bind(vin)
        .fetch_optional(&self.pool)
        .await?;

        Ok(vehicle)
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> StoreResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<Postgres, Vehicle>(
            r#"
            SELECT
                id, first_name, last_name, email, car_make, car_model, vin,
                manufactured_date, age_of_vehicle, created_at
            FROM vehicles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(vehicle)
    }

    #[tracing::instrument(skip(self))]
    async fn find_manufactured_on_or_before(&self, cutoff: NaiveDate) -> StoreResult<Vec<Vehicle>> {
        let vehicles = sqlx::query_as::<Postgres, Vehicle>(
            r#"
            SELECT
                id, first_name, last_name, email, car_make, car_model, vin,
                manufactured_date, age_of_vehicle, created_at
            FROM vehicles
            WHERE manufactured_date <= $1
            ORDER BY id ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(vehicles)
    }

    #[tracing::instrument(skip(self, changes))]
    async fn update(&self, vin: &str, changes: &VehicleUpdate) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE vehicles
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email),
                car_make = COALESCE($5, car_make),
                car_model = COALESCE($6, car_model),
                manufactured_date = COALESCE($7, manufactured_date),
                age_of_vehicle = COALESCE($8, age_of_vehicle)
            WHERE vin = $1
            "#,
        )
        .bind(vin)
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(&changes.email)
        .bind(&changes.car_make)
        .bind(&changes.car_model)
        .bind(changes.manufactured_date)
        .bind(changes.age_of_vehicle)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self, vehicle), fields(vehicle_id = vehicle.id))]
    async fn delete(&self, vehicle: &Vehicle) -> StoreResult<()> {
        sqlx::query("DELETE FROM vehicles WHERE id = $1")
            .bind(vehicle.id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn list_page(&self, offset: i64, limit: i64) -> StoreResult<(Vec<Vehicle>, i64)> {
        let vehicles = sqlx::query_as::<Postgres, Vehicle>(
            r#"
            SELECT
                id, first_name, last_name, email, car_make, car_model, vin,
                manufactured_date, age_of_vehicle, created_at
            FROM vehicles
            ORDER BY id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vehicles")
            .fetch_one(&self.pool)
            .await?;

        Ok((vehicles, total))
    }

    #[tracing::instrument(skip(self))]
    async fn search_by_model(&self, keyword: &str) -> StoreResult<Vec<Vehicle>> {
        let vehicles = sqlx::query_as::<Postgres, Vehicle>(
            r#"
            SELECT
                id, first_name, last_name, email, car_make, car_model, vin,
                manufactured_date, age_of_vehicle, created_at
            FROM vehicles
            WHERE car_model ILIKE $1
            ORDER BY id ASC
            "#,
        )
        .bind(like_pattern(keyword))
        .fetch_all(&self.pool)
        .await?;

        Ok(vehicles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Civic"), "%Civic%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
    }

    #[test]
    fn non_database_errors_are_not_uniqueness_violations() {
        let err = map_insert_error(sqlx::Error::PoolTimedOut, "A1");
        assert!(!err.is_uniqueness_violation());
    }
}
