//! Test doubles and fixtures shared by the pipeline tests.

use async_trait::async_trait;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, Worksheet, XlsxError};
use std::path::Path;
use std::sync::Mutex;

use fleetport_infra::{DeliveryStatus, Notifier, NotifyError};

/// (email, message, file name)
pub type SentNotification = (String, String, Option<String>);

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    unconfigured: bool,
    failing: bool,
}

impl RecordingNotifier {
    /// Behaves like a notifier with no endpoint configured.
    pub fn unconfigured() -> Self {
        Self {
            unconfigured: true,
            ..Default::default()
        }
    }

    /// Records the call, then reports a delivery failure.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        email: &str,
        message: &str,
        file_name: Option<&str>,
    ) -> Result<DeliveryStatus, NotifyError> {
        if self.unconfigured {
            return Err(NotifyError::Configuration("unset".into()));
        }
        self.sent.lock().unwrap().push((
            email.to_string(),
            message.to_string(),
            file_name.map(str::to_string),
        ));
        if self.failing {
            return Ok(DeliveryStatus::Failed("503 Service Unavailable".into()));
        }
        Ok(DeliveryStatus::Delivered)
    }
}

const WORKBOOK_HEADER: [&str; 7] = [
    "First Name",
    "Last Name",
    "Email",
    "Car Make",
    "Car Model",
    "VIN",
    "Manufactured Date",
];

fn write_vehicle_sheet(
    sheet: &mut Worksheet,
    header_row: u32,
    vin: &str,
    built: (u16, u8, u8),
) -> Result<(), XlsxError> {
    for (col, title) in WORKBOOK_HEADER.iter().enumerate() {
        sheet.write_string(header_row, col as u16, *title)?;
    }
    let row = header_row + 1;
    for (col, value) in ["Ada", "Lovelace", "ada@example.com", "Toyota", "Corolla", vin]
        .iter()
        .enumerate()
    {
        sheet.write_string(row, col as u16, *value)?;
    }
    let date = ExcelDateTime::from_ymd(built.0, built.1, built.2)?;
    let format = Format::new().set_num_format("dd/mm/yyyy");
    sheet.write_datetime_with_format(row, 6, &date, &format)?;
    Ok(())
}

/// Writes a three-sheet workbook: `A1` (built 2015-06-01) on the first
/// sheet, a sheet whose header sits below a blank row holding `A2` (built
/// 2018-03-20), and an empty third sheet. Dates are real date cells.
pub fn write_fleet_workbook(path: &Path) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();

    let first = workbook.add_worksheet().set_name("Fleet A")?;
    write_vehicle_sheet(first, 0, "A1", (2015, 6, 1))?;

    let second = workbook.add_worksheet().set_name("Fleet B")?;
    write_vehicle_sheet(second, 1, "A2", (2018, 3, 20))?;

    workbook.add_worksheet().set_name("Notes")?;

    workbook.save(path)
}
