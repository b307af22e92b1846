use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A persisted vehicle record. The VIN is the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Vehicle {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub car_make: String,
    pub car_model: String,
    pub vin: String,
    pub manufactured_date: NaiveDate,
    pub age_of_vehicle: i32,
    pub created_at: DateTime<Utc>,
}

/// A validated record that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVehicle {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub car_make: String,
    pub car_model: String,
    pub vin: String,
    pub manufactured_date: NaiveDate,
    pub age_of_vehicle: i32,
}

/// Partial update keyed by VIN. `None` leaves the column untouched.
///
/// `age_of_vehicle` is not accepted from callers; it is filled in by the
/// service layer whenever `manufactured_date` changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VehicleUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub car_make: Option<String>,
    pub car_model: Option<String>,
    pub manufactured_date: Option<NaiveDate>,
    #[serde(skip)]
    pub age_of_vehicle: Option<i32>,
}

impl VehicleUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.car_make.is_none()
            && self.car_model.is_none()
            && self.manufactured_date.is_none()
    }
}

/// Completed years between `manufactured` and `today`.
///
/// One year is subtracted when today's month/day falls before the
/// manufacture month/day, so a car built on 2020-06-15 is 3 on 2024-06-14
/// and 4 on 2024-06-15.
pub fn calendar_age(manufactured: NaiveDate, today: NaiveDate) -> i32 {
    let mut years = today.year() - manufactured.year();
    if (today.month(), today.day()) < (manufactured.month(), manufactured.day()) {
        years -= 1;
    }
    years
}

/// Latest manufacture date of a vehicle that is at least `min_age` years old
/// on `today`: `calendar_age(d, today) >= min_age` exactly when `d <= cutoff`.
///
/// On a leap day the cutoff in a common year clamps to Feb 28. `None` when
/// the cutoff falls before the calendar's range, meaning nothing qualifies.
pub fn age_cutoff(today: NaiveDate, min_age: u32) -> Option<NaiveDate> {
    today.checked_sub_months(Months::new(min_age.checked_mul(12)?))
}

/// One page of results plus the total count across all pages.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn age_counts_completed_years_only() {
        let built = date(2020, 6, 15);
        assert_eq!(calendar_age(built, date(2024, 6, 14)), 3);
        assert_eq!(calendar_age(built, date(2024, 6, 15)), 4);
        assert_eq!(calendar_age(built, date(2024, 12, 31)), 4);
        assert_eq!(calendar_age(built, date(2025, 1, 1)), 4);
    }

    #[test]
    fn age_is_zero_within_first_year() {
        assert_eq!(calendar_age(date(2023, 3, 1), date(2023, 3, 1)), 0);
        assert_eq!(calendar_age(date(2023, 3, 1), date(2024, 2, 29)), 0);
    }

    #[test]
    fn leap_day_birthday_waits_for_march_in_common_years() {
        let built = date(2020, 2, 29);
        assert_eq!(calendar_age(built, date(2021, 2, 28)), 0);
        assert_eq!(calendar_age(built, date(2021, 3, 1)), 1);
    }

    #[test]
    fn cutoff_agrees_with_calendar_age() {
        let last = date(2021, 3, 5);
        for today in [date(2024, 2, 29), date(2023, 2, 28), date(2024, 3, 1), date(2025, 12, 31)] {
            for min_age in 0..11 {
                let cutoff = age_cutoff(today, min_age).unwrap();
                for built in date(2014, 12, 25).iter_days().take_while(|d| *d <= last) {
                    assert_eq!(
                        built <= cutoff,
                        calendar_age(built, today) >= min_age as i32,
                        "built {} today {} min_age {}",
                        built,
                        today,
                        min_age
                    );
                }
            }
        }
    }

    #[test]
    fn cutoff_out_of_range_matches_nothing() {
        assert_eq!(age_cutoff(date(2024, 6, 15), 0), Some(date(2024, 6, 15)));
        assert_eq!(age_cutoff(date(2024, 6, 15), u32::MAX), None);
    }

    #[test]
    fn empty_update_detected() {
        assert!(VehicleUpdate::default().is_empty());
        let update = VehicleUpdate {
            car_model: Some("Corolla".into()),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
