//! Scalar field projection (`select`/`omit`).
//!
//! Records always decode in full; projection is applied to the serialized
//! JSON form afterwards. `select` keeps only the named scalar fields, `omit`
//! drops the named fields, and a client-wide omit map contributes additional
//! drops per entity. Relation keys added by include loading are always kept.

use serde_json::Value;

use crate::error::{DataError, Result};

use super::traits::{DatabaseEntity, FieldSet};

/// Serialize records and apply the requested projection. `select` and `omit`
/// are mutually exclusive; the caller validates that before dispatch.
pub fn project<E: DatabaseEntity>(
    records: &[E],
    select: Option<&[E::Field]>,
    omit: Option<&[E::Field]>,
    global_omit: &[String],
) -> Result<Vec<Value>> {
    records
        .iter()
        .map(|record| project_one::<E>(record, select, omit, global_omit))
        .collect()
}

pub fn project_one<E: DatabaseEntity>(
    record: &E,
    select: Option<&[E::Field]>,
    omit: Option<&[E::Field]>,
    global_omit: &[String],
) -> Result<Value> {
    let mut value = serde_json::to_value(record)
        .map_err(|e| DataError::EnginePanic(format!("serialization failed: {e}")))?;
    let Value::Object(map) = &mut value else {
        return Err(DataError::EnginePanic(
            "entity did not serialize to an object".into(),
        ));
    };

    if let Some(select) = select {
        let scalars: Vec<&'static str> = E::Field::all().iter().map(|f| f.column()).collect();
        let keep: Vec<&'static str> = select.iter().map(|f| f.column()).collect();
        // Non-scalar keys (loaded relations) survive a select untouched.
        map.retain(|key, _| !scalars.contains(&key.as_str()) || keep.contains(&key.as_str()));
    } else {
        if let Some(omit) = omit {
            for field in omit {
                map.remove(field.column());
            }
        }
        for column in global_omit {
            map.remove(column);
        }
    }

    Ok(value)
}
