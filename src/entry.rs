// Entry Workflow - validate and submit one water-meter reading

use crate::db::{ReadingStore, DATE_FORMAT};
use chrono::{Local, NaiveDateTime};
use thiserror::Error;
use tracing::warn;

/// Raw values typed into the entry form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryForm {
    pub house_number: String,
    pub water_meter: f64,
}

impl EntryForm {
    pub fn new(house_number: impl Into<String>, water_meter: f64) -> Self {
        Self {
            house_number: house_number.into(),
            water_meter,
        }
    }
}

/// Why a submission did not produce a stored row.
///
/// The messages are shown to the user as-is.
#[derive(Debug, Error, PartialEq)]
pub enum EntryError {
    #[error("Please enter a house number")]
    EmptyHouseNumber,

    #[error("Water meter reading must be a number of at least 0 (got {0})")]
    InvalidWaterMeter(f64),

    #[error("Failed to add data")]
    StorageFailed,
}

/// A reading accepted by storage, echoed back to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct Submitted {
    pub house_number: String,
    pub water_meter: f64,
    pub date: String,
    pub price: f64,
}

/// Validates readings and prices them with the rate it was built with
#[derive(Debug, Clone, Copy)]
pub struct EntryWorkflow {
    unit_rate: f64,
}

impl EntryWorkflow {
    pub fn new(unit_rate: f64) -> Self {
        Self { unit_rate }
    }

    pub fn unit_rate(&self) -> f64 {
        self.unit_rate
    }

    pub fn price_for(&self, water_meter: f64) -> f64 {
        water_meter * self.unit_rate
    }

    pub fn validate(&self, form: &EntryForm) -> Result<(), EntryError> {
        if form.house_number.trim().is_empty() {
            return Err(EntryError::EmptyHouseNumber);
        }
        if !form.water_meter.is_finite() || form.water_meter < 0.0 {
            return Err(EntryError::InvalidWaterMeter(form.water_meter));
        }
        Ok(())
    }

    /// Submit a reading stamped with the current local time
    pub fn submit(&self, store: &ReadingStore, form: &EntryForm) -> Result<Submitted, EntryError> {
        self.submit_at(store, form, Local::now().naive_local())
    }

    /// Submit a reading stamped with `now`.
    ///
    /// Nothing is written unless validation passes. A storage failure is
    /// final for this attempt; the caller has to resubmit.
    pub fn submit_at(
        &self,
        store: &ReadingStore,
        form: &EntryForm,
        now: NaiveDateTime,
    ) -> Result<Submitted, EntryError> {
        if let Err(e) = self.validate(form) {
            warn!(house_number = %form.house_number, error = %e, "submission rejected");
            return Err(e);
        }

        let house_number = form.house_number.trim().to_string();
        let date = now.format(DATE_FORMAT).to_string();
        let price = self.price_for(form.water_meter);

        if store.insert(&house_number, form.water_meter, &date, price) {
            Ok(Submitted {
                house_number,
                water_meter: form.water_meter,
                date,
                price,
            })
        } else {
            Err(EntryError::StorageFailed)
        }
    }
}
