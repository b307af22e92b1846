//! Vehicle lookups and edits outside the import/export pipelines.

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use validator::ValidateEmail;

use fleetport_core::models::{calendar_age, Page, Vehicle, VehicleUpdate};
use fleetport_core::AppError;
use fleetport_db::VehicleStore;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

pub struct VehicleService {
    store: Arc<dyn VehicleStore>,
    fixed_today: Option<NaiveDate>,
}

impl VehicleService {
    pub fn new(store: Arc<dyn VehicleStore>) -> Self {
        Self {
            store,
            fixed_today: None,
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.fixed_today.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// The stored age is as of the day the row was written.
    fn with_current_age(&self, mut vehicle: Vehicle) -> Vehicle {
        vehicle.age_of_vehicle = calendar_age(vehicle.manufactured_date, self.today());
        vehicle
    }

    /// `page` starts at 1. Out-of-range values are clamped rather than rejected.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, page: u32, page_size: u32) -> Result<Page<Vehicle>, AppError> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let offset = (i64::from(page) - 1) * i64::from(page_size);

        let (data, total) = self
            .store
            .list_page(offset, i64::from(page_size))
            .await?;

        Ok(Page {
            data: data.into_iter().map(|v| self.with_current_age(v)).collect(),
            total,
            page,
            page_size,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_by_vin(&self, vin: &str) -> Result<Vehicle, AppError> {
        self.store
            .find_by_vin(vin)
            .await?
            .map(|v| self.with_current_age(v))
            .ok_or_else(|| AppError::NotFound(format!("Vehicle with VIN {} not found", vin)))
    }

    #[tracing::instrument(skip(self))]
    pub async fn search_by_model(&self, model: &str) -> Result<Vec<Vehicle>, AppError> {
        let model = model.trim();
        if model.is_empty() {
            return Err(AppError::InvalidInput(
                "Search keyword must not be empty".to_string(),
            ));
        }
        let found = self.store.search_by_model(model).await?;
        Ok(found.into_iter().map(|v| self.with_current_age(v)).collect())
    }

    /// Applies a partial update and returns the stored result. The age is
    /// recomputed whenever the manufacture date changes.
    #[tracing::instrument(skip(self, changes))]
    pub async fn update(&self, vin: &str, mut changes: VehicleUpdate) -> Result<Vehicle, AppError> {
        if changes.is_empty() {
            return Err(AppError::InvalidInput("No fields to update".to_string()));
        }
        if let Some(email) = &changes.email {
            if !email.validate_email() {
                return Err(AppError::InvalidInput(format!("Invalid email: {}", email)));
            }
        }

        changes.age_of_vehicle = None;
        if let Some(date) = changes.manufactured_date {
            let today = self.today();
            if date > today {
                return Err(AppError::InvalidInput(format!(
                    "manufactured_date {} is in the future",
                    date
                )));
            }
            changes.age_of_vehicle = Some(calendar_age(date, today));
        }

        let affected = self.store.update(vin, &changes).await?;
        if affected == 0 {
            return Err(AppError::NotFound(format!(
                "Vehicle with VIN {} not found",
                vin
            )));
        }

        tracing::info!(vin = %vin, "Vehicle updated");
        self.find_by_vin(vin).await
    }

    /// Deletes by numeric id and returns the record as it was.
    #[tracing::instrument(skip(self))]
    pub async fn remove_by_id(&self, id: i64) -> Result<Vehicle, AppError> {
        let vehicle = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Vehicle with id {} not found", id)))?;

        self.store.delete(&vehicle).await?;
        tracing::info!(id, vin = %vehicle.vin, "Vehicle deleted");

        Ok(self.with_current_age(vehicle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetport_core::models::NewVehicle;
    use fleetport_db::MemoryVehicleStore;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    async fn service_with(vins: &[&str]) -> (VehicleService, Arc<MemoryVehicleStore>) {
        let store = Arc::new(MemoryVehicleStore::new());
        for (i, vin) in vins.iter().enumerate() {
            store
                .insert(&NewVehicle {
                    first_name: "Ada".into(),
                    last_name: "Lovelace".into(),
                    email: "ada@example.com".into(),
                    car_make: "Toyota".into(),
                    car_model: if i % 2 == 0 { "Corolla" } else { "Camry" }.into(),
                    vin: vin.to_string(),
                    manufactured_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                    age_of_vehicle: 4,
                })
                .await
                .unwrap();
        }
        (
            VehicleService::new(store.clone()).with_today(today()),
            store,
        )
    }

    #[tokio::test]
    async fn list_pages_and_clamps_size() {
        let (service, _) = service_with(&["A", "B", "C"]).await;

        let page = service.list(2, 2).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].vin, "C");

        let page = service.list(0, 1000).await.unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, MAX_PAGE_SIZE);
    }

    #[tokio::test]
    async fn update_recomputes_age() {
        let (service, _) = service_with(&["A"]).await;

        let changes = VehicleUpdate {
            manufactured_date: NaiveDate::from_ymd_opt(2014, 7, 1),
            age_of_vehicle: Some(99),
            ..Default::default()
        };
        let updated = service.update("A", changes).await.unwrap();

        assert_eq!(updated.age_of_vehicle, 9);
        assert_eq!(updated.car_model, "Corolla");
    }

    #[tokio::test]
    async fn reads_report_age_as_of_today() {
        let (_, store) = service_with(&["A"]).await;
        let later = VehicleService::new(store.clone())
            .with_today(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap());

        assert_eq!(later.find_by_vin("A").await.unwrap().age_of_vehicle, 10);
        assert_eq!(later.list(1, 10).await.unwrap().data[0].age_of_vehicle, 10);
        assert_eq!(later.search_by_model("corolla").await.unwrap()[0].age_of_vehicle, 10);
    }

    #[tokio::test]
    async fn update_unknown_vin_is_not_found() {
        let (service, _) = service_with(&[]).await;
        let changes = VehicleUpdate {
            car_model: Some("Yaris".into()),
            ..Default::default()
        };

        let err = service.update("missing", changes).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_rejects_empty_and_invalid_changes() {
        let (service, _) = service_with(&["A"]).await;

        let err = service.update("A", VehicleUpdate::default()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let changes = VehicleUpdate {
            email: Some("nope".into()),
            ..Default::default()
        };
        let err = service.update("A", changes).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn remove_by_id_returns_deleted_vehicle() {
        let (service, store) = service_with(&["A", "B"]).await;
        let a = service.find_by_vin("A").await.unwrap();

        let removed = service.remove_by_id(a.id).await.unwrap();
        assert_eq!(removed.vin, "A");
        assert_eq!(store.len(), 1);

        let err = service.remove_by_id(a.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn search_is_case_insensitive() {
        let (service, _) = service_with(&["A", "B", "C"]).await;

        let found = service.search_by_model("camry").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].vin, "B");

        assert!(service.search_by_model("  ").await.is_err());
    }
}
