//! Record normalizer
//!
//! Converts one raw row into a [`NewVehicle`] or says why it cannot. The
//! vehicle's age is always computed here; an `age_of_vehicle` column in the
//! input is ignored.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use validator::ValidateEmail;

use fleetport_core::models::{calendar_age, NewVehicle};

use super::parser::RawRow;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowRejection {
    #[error("missing required column '{0}'")]
    MissingField(&'static str),

    #[error("invalid email '{0}'")]
    InvalidEmail(String),

    #[error("unparsable manufactured_date '{0}'")]
    InvalidDate(String),

    #[error("manufactured_date {0} is in the future")]
    FutureDate(NaiveDate),
}

pub fn normalize(row: &RawRow, today: NaiveDate) -> Result<NewVehicle, RowRejection> {
    let first_name = required(row, "first_name")?;
    let last_name = required(row, "last_name")?;
    let email = required(row, "email")?;
    let car_make = required(row, "car_make")?;
    let car_model = required(row, "car_model")?;
    let vin = required(row, "vin")?;
    let raw_date = required(row, "manufactured_date")?;

    if !email.validate_email() {
        return Err(RowRejection::InvalidEmail(email));
    }

    let manufactured_date =
        parse_date(&raw_date).ok_or_else(|| RowRejection::InvalidDate(raw_date.clone()))?;
    if manufactured_date > today {
        return Err(RowRejection::FutureDate(manufactured_date));
    }

    Ok(NewVehicle {
        first_name,
        last_name,
        email,
        car_make,
        car_model,
        vin,
        manufactured_date,
        age_of_vehicle: calendar_age(manufactured_date, today),
    })
}

/// Accepts plain dates in a few common layouts as well as timestamps, of
/// which only the date part is kept.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn required(row: &RawRow, column: &'static str) -> Result<String, RowRejection> {
    row.get(column)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(RowRejection::MissingField(column))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn row(date: &str) -> RawRow {
        [
            ("first_name", "Ada"),
            ("last_name", "Lovelace"),
            ("email", "ada@example.com"),
            ("car_make", "Toyota"),
            ("car_model", "Corolla"),
            ("vin", " JT123 "),
            ("manufactured_date", date),
            ("age_of_vehicle", "99"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn valid_row_gets_calendar_age() {
        let vehicle = normalize(&row("2019-06-16"), today()).unwrap();
        assert_eq!(vehicle.vin, "JT123");
        assert_eq!(vehicle.age_of_vehicle, 4);

        let vehicle = normalize(&row("2019-06-15"), today()).unwrap();
        assert_eq!(vehicle.age_of_vehicle, 5);
    }

    #[test]
    fn accepted_date_layouts() {
        let expected = NaiveDate::from_ymd_opt(2018, 3, 9).unwrap();
        for raw in [
            "2018-03-09",
            "2018/03/09",
            "03/09/2018",
            "2018-03-09T10:00:00Z",
            "2018-03-09T10:00:00+02:00",
            "2018-03-09 10:00:00",
        ] {
            assert_eq!(parse_date(raw), Some(expected), "{}", raw);
        }
    }

    #[test]
    fn unparsable_date_is_rejected() {
        let err = normalize(&row("not a date"), today()).unwrap_err();
        assert_eq!(err, RowRejection::InvalidDate("not a date".into()));
    }

    #[test]
    fn future_date_is_rejected() {
        let err = normalize(&row("2030-01-01"), today()).unwrap_err();
        assert!(matches!(err, RowRejection::FutureDate(_)));
    }

    #[test]
    fn missing_or_blank_column_is_rejected() {
        let mut r = row("2019-01-01");
        r.remove("car_make");
        assert_eq!(
            normalize(&r, today()).unwrap_err(),
            RowRejection::MissingField("car_make")
        );

        let mut r = row("2019-01-01");
        r.insert("vin".into(), "   ".into());
        assert_eq!(
            normalize(&r, today()).unwrap_err(),
            RowRejection::MissingField("vin")
        );
    }

    #[test]
    fn malformed_email_is_rejected() {
        let mut r = row("2019-01-01");
        r.insert("email".into(), "not-an-email".into());
        assert!(matches!(
            normalize(&r, today()).unwrap_err(),
            RowRejection::InvalidEmail(_)
        ));
    }
}
