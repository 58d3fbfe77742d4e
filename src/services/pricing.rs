use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{PricingConfig, PricingTable, Slot};

pub const PRICING_KEY: &str = "pricing";

/// Loads the active pricing table. A missing setting means the built-in table;
/// a malformed one is logged and also falls back to the built-in table.
pub fn load_pricing(conn: &Connection) -> Result<PricingConfig, AppError> {
    let Some(stored) = queries::get_setting(conn, PRICING_KEY)? else {
        return Ok(PricingConfig::builtin());
    };

    match PricingTable::from_json(&stored.value) {
        Ok(table) => Ok(PricingConfig {
            version: stored.version,
            table,
            updated_at: NaiveDateTime::parse_from_str(&stored.updated_at, queries::TS_FORMAT).ok(),
        }),
        Err(e) => {
            tracing::warn!(
                error = %e,
                version = stored.version,
                "stored pricing configuration is malformed, using built-in prices"
            );
            Ok(PricingConfig::builtin())
        }
    }
}

pub fn save_pricing(
    conn: &Connection,
    table: &PricingTable,
    now: NaiveDateTime,
) -> Result<PricingConfig, AppError> {
    table
        .validate()
        .map_err(|_| AppError::field("pricing", "prices must be non-negative"))?;

    let value = serde_json::to_string(table).map_err(|e| AppError::Config(e.to_string()))?;
    let version = queries::put_setting(conn, PRICING_KEY, &value, &now)?;
    tracing::info!(version, "pricing configuration updated");

    Ok(PricingConfig {
        version,
        table: *table,
        updated_at: Some(now),
    })
}

pub fn quote(
    conn: &Connection,
    date: NaiveDate,
    slot: Slot,
    is_couple: bool,
) -> Result<i64, AppError> {
    Ok(load_pricing(conn)?.table.price(date, slot, is_couple))
}
