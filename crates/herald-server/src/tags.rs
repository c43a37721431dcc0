//! Tag merge engine.
//!
//! Turns an incoming `key -> value` map into per-key operations against the
//! stored tag set of one device. The merge is additive/subtractive per key:
//! keys absent from the incoming map are never touched, and an empty value is
//! a removal signal rather than a storable tag value.
//!
//! [`plan_tag_merge`] is pure. [`apply_tag_operations`] executes a plan on a
//! connection the caller already holds, normally the transaction that also
//! writes the device row.

use std::collections::BTreeMap;

use sqlx::SqliteConnection;

use herald_core::db::DatabaseError;

/// A single tag mutation for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOperation {
    /// Insert the tag, or replace the value of an existing `(device, key)`.
    Upsert {
        device_id: i64,
        key: String,
        value: String,
    },
    /// Remove the `(device, key)` tag if present.
    Delete { device_id: i64, key: String },
}

impl TagOperation {
    pub fn key(&self) -> &str {
        match self {
            Self::Upsert { key, .. } | Self::Delete { key, .. } => key,
        }
    }
}

/// Build the operations needed to merge `tags` into the tag set of
/// `device_id`. Operations come out in key order.
pub fn plan_tag_merge(device_id: i64, tags: &BTreeMap<String, String>) -> Vec<TagOperation> {
    tags.iter()
        .map(|(key, value)| {
            if value.is_empty() {
                TagOperation::Delete {
                    device_id,
                    key: key.clone(),
                }
            } else {
                TagOperation::Upsert {
                    device_id,
                    key: key.clone(),
                    value: value.clone(),
                }
            }
        })
        .collect()
}

/// Execute `ops` on `conn`.
///
/// Stops at the first failing statement; the caller's transaction is expected
/// to roll back in that case.
pub async fn apply_tag_operations(
    conn: &mut SqliteConnection,
    ops: &[TagOperation],
) -> Result<(), DatabaseError> {
    for op in ops {
        match op {
            TagOperation::Upsert {
                device_id,
                key,
                value,
            } => {
                sqlx::query(
                    "INSERT INTO tags (device_id, key, value) VALUES (?, ?, ?) \
                     ON CONFLICT(device_id, key) DO UPDATE SET value = excluded.value",
                )
                .bind(device_id)
                .bind(key)
                .bind(value)
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    DatabaseError::Query(format!("failed to upsert tag {key} on device {device_id}: {e}"))
                })?;
            }
            TagOperation::Delete { device_id, key } => {
                sqlx::query("DELETE FROM tags WHERE device_id = ? AND key = ?")
                    .bind(device_id)
                    .bind(key)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| {
                        DatabaseError::Query(format!("failed to delete tag {key} on device {device_id}: {e}"))
                    })?;
            }
        }
    }
    Ok(())
}

/// Load the full tag set of a device.
pub async fn load_tags(
    conn: &mut SqliteConnection,
    device_id: i64,
) -> Result<BTreeMap<String, String>, DatabaseError> {
    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT key, value FROM tags WHERE device_id = ?")
            .bind(device_id)
            .fetch_all(&mut *conn)
            .await?;
    Ok(rows.into_iter().collect())
}
