use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::booking::Slot;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnavailableSlot {
    pub date: NaiveDate,
    pub slot: Slot,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayAvailability {
    Free,
    Partial,
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub availability: DayAvailability,
    pub free_slots: Vec<Slot>,
}

/// Folds occupied slots into one entry per date in `from..=to`.
pub fn summarize(occupied: &[UnavailableSlot], from: NaiveDate, to: NaiveDate) -> Vec<CalendarDay> {
    let mut taken: BTreeMap<NaiveDate, Vec<Slot>> = BTreeMap::new();
    for u in occupied {
        if u.date >= from && u.date <= to {
            let slots = taken.entry(u.date).or_default();
            if !slots.contains(&u.slot) {
                slots.push(u.slot);
            }
        }
    }

    from.iter_days()
        .take_while(|d| *d <= to)
        .map(|date| {
            let taken_slots = taken.get(&date).map(Vec::as_slice).unwrap_or(&[]);
            let free_slots: Vec<Slot> = Slot::ALL
                .into_iter()
                .filter(|s| !taken_slots.contains(s))
                .collect();
            let availability = match free_slots.len() {
                0 => DayAvailability::Full,
                1 => DayAvailability::Partial,
                _ => DayAvailability::Free,
            };
            CalendarDay {
                date,
                availability,
                free_slots,
            }
        })
        .collect()
}
