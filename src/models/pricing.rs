use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use super::booking::Slot;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayClass {
    Weekday,
    Saturday,
    Sunday,
}

impl DayClass {
    /// Classified from the calendar date alone, so no timezone shift can move it.
    pub fn of(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Sat => DayClass::Saturday,
            Weekday::Sun => DayClass::Sunday,
            _ => DayClass::Weekday,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotPrices {
    #[serde(rename = "DAY")]
    pub day: i64,
    #[serde(rename = "NIGHT")]
    pub night: i64,
}

impl SlotPrices {
    pub fn get(&self, slot: Slot) -> i64 {
        match slot {
            Slot::Day => self.day,
            Slot::Night => self.night,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierPrices {
    #[serde(rename = "WEEKDAY")]
    pub weekday: SlotPrices,
    #[serde(rename = "SATURDAY")]
    pub saturday: SlotPrices,
    #[serde(rename = "SUNDAY")]
    pub sunday: SlotPrices,
}

impl TierPrices {
    pub fn get(&self, class: DayClass) -> &SlotPrices {
        match class {
            DayClass::Weekday => &self.weekday,
            DayClass::Saturday => &self.saturday,
            DayClass::Sunday => &self.sunday,
        }
    }

    fn all(&self) -> [&SlotPrices; 3] {
        [&self.weekday, &self.saturday, &self.sunday]
    }
}

/// Prices keyed by promo tier, day class and slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PricingTable {
    #[serde(rename = "GENERAL")]
    pub general: TierPrices,
    #[serde(rename = "COUPLE")]
    pub couple: TierPrices,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            general: TierPrices {
                weekday: SlotPrices { day: 3500, night: 4000 },
                saturday: SlotPrices { day: 5500, night: 6000 },
                sunday: SlotPrices { day: 5000, night: 4000 },
            },
            couple: TierPrices {
                weekday: SlotPrices { day: 1800, night: 2200 },
                saturday: SlotPrices { day: 2800, night: 3200 },
                sunday: SlotPrices { day: 2500, night: 2200 },
            },
        }
    }
}

impl PricingTable {
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let table: PricingTable = serde_json::from_str(s)?;
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (tier, prices) in [("GENERAL", &self.general), ("COUPLE", &self.couple)] {
            for slots in prices.all() {
                if slots.day < 0 || slots.night < 0 {
                    anyhow::bail!("negative price in {tier} table");
                }
            }
        }
        Ok(())
    }

    pub fn price(&self, date: NaiveDate, slot: Slot, is_couple: bool) -> i64 {
        price(date, slot, is_couple, self)
    }
}

pub fn price(date: NaiveDate, slot: Slot, is_couple: bool, table: &PricingTable) -> i64 {
    let tier = if is_couple { &table.couple } else { &table.general };
    tier.get(DayClass::of(date)).get(slot)
}

/// The active pricing table together with its settings version. Version 0
/// means nothing is stored and the built-in table is in effect.
#[derive(Debug, Clone, Serialize)]
pub struct PricingConfig {
    pub version: i64,
    pub table: PricingTable,
    pub updated_at: Option<NaiveDateTime>,
}

impl PricingConfig {
    pub fn builtin() -> Self {
        Self {
            version: 0,
            table: PricingTable::default(),
            updated_at: None,
        }
    }

    pub fn is_builtin(&self) -> bool {
        self.version == 0
    }
}
