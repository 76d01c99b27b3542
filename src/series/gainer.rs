//! Month-over-month top gainer.

use super::TimeSeries;
use crate::types::{CurrentEntity, EntityId, MonthLabel};
use chrono::NaiveDate;

#[derive(Clone, Debug, PartialEq)]
pub struct Gainer {
    pub id: EntityId,
    pub current: f64,
    pub previous: f64,
    pub increase: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GainerReport {
    pub reference_date: NaiveDate,
    pub leader: Option<Gainer>,
    /// Current entities with a value recorded exactly on the reference date.
    ///
    /// Zero means every comparison fell back to a previous value of 0, so the
    /// leader is simply the largest current holder.
    pub with_reference: usize,
}

/// Last day of the month before `today`'s month.
pub fn reference_date(today: NaiveDate) -> NaiveDate {
    MonthLabel::from_date(today)
        .prev()
        .map(|m| m.last_day())
        .unwrap_or(today)
}

/// Entity with the largest increase since `reference_date`.
///
/// The previous value is the one recorded on exactly that day, or 0. Ties go
/// to the entity listed first.
pub fn top_gainer(current: &[CurrentEntity], series: &TimeSeries, reference_date: NaiveDate) -> GainerReport {
    let mut leader: Option<Gainer> = None;
    let mut with_reference = 0;

    for entity in current {
        let previous = match series.value_on(&entity.id, reference_date) {
            Some(value) => {
                with_reference += 1;
                value
            }
            None => 0.0,
        };
        let increase = entity.value - previous;
        if leader.as_ref().map_or(true, |l| increase > l.increase) {
            leader = Some(Gainer {
                id: entity.id.clone(),
                current: entity.value,
                previous,
                increase,
            });
        }
    }

    GainerReport {
        reference_date,
        leader,
        with_reference,
    }
}
