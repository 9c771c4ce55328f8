//! Magnetic declination from the World Magnetic Model.
//!
//! The IMU reports a magnetic heading; rotating the declination in turns it
//! into a true-north heading. Without a position fix the declination is
//! unknown and the raw magnetic heading is used, an accepted drift.

use chrono::Datelike;
use world_magnetic_model::{
    time::Date,
    uom::si::{
        angle::degree,
        f32::{Angle, Length},
        length::meter,
    },
    GeomagneticField,
};

use crate::protocol::LocationSample;

/// Declination at `fix` for the given date, degrees, positive east.
/// None when the position or date is outside the model's validity range.
pub fn declination_at(fix: LocationSample, date: Date) -> Option<f32> {
    GeomagneticField::new(
        Length::new::<meter>(0.0),
        Angle::new::<degree>(fix.latitude as f32),
        Angle::new::<degree>(fix.longitude as f32),
        date,
    )
    .ok()
    .map(|field| field.declination().get::<degree>())
}

/// Declination for today at the latest fix, 0.0 while no fix is known.
pub fn current_declination(fix: Option<LocationSample>) -> f32 {
    let Some(fix) = fix else {
        return 0.0;
    };
    let now = chrono::Utc::now();
    let Ok(date) = Date::from_ordinal_date(now.year(), now.ordinal() as u16) else {
        return 0.0;
    };
    declination_at(fix, date).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_date_has_no_declination() {
        let date = Date::from_ordinal_date(1900, 1).unwrap();
        assert_eq!(declination_at(LocationSample::new(48.1, 11.5), date), None);
    }

    #[test]
    fn missing_fix_falls_back_to_magnetic_heading() {
        assert_eq!(current_declination(None), 0.0);
    }
}
