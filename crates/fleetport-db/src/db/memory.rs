use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use fleetport_core::models::{NewVehicle, Vehicle, VehicleUpdate};

use super::vehicle::{StoreError, StoreResult, VehicleStore};

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    rows: BTreeMap<i64, Vehicle>,
    by_vin: HashMap<String, i64>,
}

/// Process-local vehicle store. Used when no database is configured and in
/// tests. VIN uniqueness is enforced under the same lock as the insert.
#[derive(Default)]
pub struct MemoryVehicleStore {
    state: Mutex<MemoryState>,
}

impl MemoryVehicleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A poisoned lock only means another thread panicked mid-test;
        // the maps themselves are never left half-updated.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl VehicleStore for MemoryVehicleStore {
    async fn insert(&self, vehicle: &NewVehicle) -> StoreResult<Vehicle> {
        let mut state = self.lock();
        if state.by_vin.contains_key(&vehicle.vin) {
            return Err(StoreError::UniquenessViolation {
                vin: vehicle.vin.clone(),
            });
        }

        state.next_id += 1;
        let stored = Vehicle {
            id: state.next_id,
            first_name: vehicle.first_name.clone(),
            last_name: vehicle.last_name.clone(),
            email: vehicle.email.clone(),
            car_make: vehicle.car_make.clone(),
            car_model: vehicle.car_model.clone(),
            vin: vehicle.vin.clone(),
            manufactured_date: vehicle.manufactured_date,
            age_of_vehicle: vehicle.age_of_vehicle,
            created_at: Utc::now(),
        };
        state.by_vin.insert(stored.vin.clone(), stored.id);
        state.rows.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_vin(&self, vin: &str) -> StoreResult<Option<Vehicle>> {
        let state = self.lock();
        Ok(state
            .by_vin
            .get(vin)
            .and_then(|id| state.rows.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<Vehicle>> {
        Ok(self.lock().rows.get(&id).cloned())
    }

    async fn find_manufactured_on_or_before(&self, cutoff: NaiveDate) -> StoreResult<Vec<Vehicle>> {
        Ok(self
            .lock()
            .rows
            .values()
            .filter(|v| v.manufactured_date <= cutoff)
            .cloned()
            .collect())
    }

    async fn update(&self, vin: &str, changes: &VehicleUpdate) -> StoreResult<u64> {
        let mut state = self.lock();
        let Some(id) = state.by_vin.get(vin).copied() else {
            return Ok(0);
        };
        let Some(row) = state.rows.get_mut(&id) else {
            return Ok(0);
        };

        if let Some(v) = &changes.first_name {
            row.first_name = v.clone();
        }
        if let Some(v) = &changes.last_name {
            row.last_name = v.clone();
        }
        if let Some(v) = &changes.email {
            row.email = v.clone();
        }
        if let Some(v) = &changes.car_make {
            row.car_make = v.clone();
        }
        if let Some(v) = &changes.car_model {
            row.car_model = v.clone();
        }
        if let Some(v) = changes.manufactured_date {
            row.manufactured_date = v;
        }
        if let Some(v) = changes.age_of_vehicle {
            row.age_of_vehicle = v;
        }
        Ok(1)
    }

    async fn delete(&self, vehicle: &Vehicle) -> StoreResult<()> {
        let mut state = self.lock();
        if let Some(removed) = state.rows.remove(&vehicle.id) {
            state.by_vin.remove(&removed.vin);
        }
        Ok(())
    }

    async fn list_page(&self, offset: i64, limit: i64) -> StoreResult<(Vec<Vehicle>, i64)> {
        let state = self.lock();
        let page = state
            .rows
            .values()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, state.rows.len() as i64))
    }

    async fn search_by_model(&self, keyword: &str) -> StoreResult<Vec<Vehicle>> {
        let needle = keyword.to_lowercase();
        Ok(self
            .lock()
            .rows
            .values()
            .filter(|v| v.car_model.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }
}
