//! VOTable type mapping for TAP metadata

use serde::Serialize;
use serde_json::Value;

use crate::document::RawObject;
use crate::error::{FelisError, Result};
use crate::types::FelisType;

/// VOTable description of a column type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VotableType {
    pub datatype: String,
    pub arraysize: Option<String>,
    pub xtype: Option<String>,
}

impl VotableType {
    /// Resolve a column's VOTable type, applying explicit `votable:*` values
    /// over the datatype defaults
    pub fn from_column(
        column: &RawObject<'_>,
        datatype: FelisType,
        force_unbounded: bool,
    ) -> Result<Self> {
        let votable_datatype = column
            .str_field("votable:datatype")?
            .unwrap_or(datatype.votable_name())
            .to_string();

        let arraysize = match column.get("votable:arraysize") {
            None | Some(Value::Null) => {
                let length = column.positive_int_field("length")?;
                default_arraysize(datatype, length, force_unbounded)
            }
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(_) => {
                return Err(FelisError::field_type(
                    column.label(),
                    "votable:arraysize",
                    "string or integer",
                ))
            }
        };

        let xtype = match column.str_field("votable:xtype")? {
            Some(xtype) => Some(xtype.to_string()),
            None if datatype.is_timestamp() => Some("timestamp".to_string()),
            None => None,
        };

        Ok(Self {
            datatype: votable_datatype,
            arraysize,
            xtype,
        })
    }
}

/// Default `arraysize` for a datatype
///
/// Only a length above one yields an array: fixed-width `char` uses the bare
/// length, variable-width types use `n*` (or `*` when forced unbounded).
/// `text` and `timestamp` without such a length are unbounded (`*`).
/// Everything else stays unset.
pub fn default_arraysize(
    datatype: FelisType,
    length: Option<u32>,
    force_unbounded: bool,
) -> Option<String> {
    use FelisType as F;

    match (datatype, length.filter(|n| *n > 1)) {
        (F::Char, Some(n)) => Some(n.to_string()),
        (F::String | F::Unicode | F::Binary, Some(_)) if force_unbounded => Some("*".to_string()),
        (F::String | F::Unicode | F::Binary, Some(n)) => Some(format!("{}*", n)),
        (F::Text | F::Timestamp, None) => Some("*".to_string()),
        _ => None,
    }
}

/// Deprecated TAP 1.0 `size`, derived from the array size
pub fn tap_size(arraysize: Option<&str>) -> Option<u32> {
    arraysize
        .map(|a| a.trim_end_matches('*'))
        .and_then(|a| a.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ObjectKind;
    use serde_json::json;

    #[test]
    fn test_default_arraysize() {
        assert_eq!(default_arraysize(FelisType::Char, Some(8), false).as_deref(), Some("8"));
        assert_eq!(default_arraysize(FelisType::Char, Some(1), false), None);
        assert_eq!(default_arraysize(FelisType::String, Some(64), false).as_deref(), Some("64*"));
        assert_eq!(default_arraysize(FelisType::String, Some(64), true).as_deref(), Some("*"));
        assert_eq!(default_arraysize(FelisType::String, None, false), None);
        assert_eq!(default_arraysize(FelisType::Char, None, false), None);
        assert_eq!(default_arraysize(FelisType::Text, None, false).as_deref(), Some("*"));
        assert_eq!(default_arraysize(FelisType::Text, Some(64), false), None);
        assert_eq!(default_arraysize(FelisType::Timestamp, None, false).as_deref(), Some("*"));
        assert_eq!(default_arraysize(FelisType::Timestamp, Some(26), false), None);
        assert_eq!(default_arraysize(FelisType::Double, None, false), None);
    }

    #[test]
    fn test_tap_size() {
        assert_eq!(tap_size(Some("64*")), Some(64));
        assert_eq!(tap_size(Some("8")), Some(8));
        assert_eq!(tap_size(Some("*")), None);
        assert_eq!(tap_size(None), None);
    }

    #[test]
    fn test_from_column_overrides() {
        let value = json!({
            "@id": "#c", "name": "c", "datatype": "string", "length": 20,
            "votable:datatype": "unicodeChar", "votable:arraysize": 40
        });
        let raw = RawObject::new(ObjectKind::Column, &value).unwrap();
        let vt = VotableType::from_column(&raw, FelisType::String, false).unwrap();
        assert_eq!(vt.datatype, "unicodeChar");
        assert_eq!(vt.arraysize.as_deref(), Some("40"));
        assert_eq!(vt.xtype, None);
    }

    #[test]
    fn test_timestamp_xtype() {
        let value = json!({"@id": "#c", "name": "c", "datatype": "timestamp"});
        let raw = RawObject::new(ObjectKind::Column, &value).unwrap();
        let vt = VotableType::from_column(&raw, FelisType::Timestamp, false).unwrap();
        assert_eq!(vt.datatype, "char");
        assert_eq!(vt.arraysize.as_deref(), Some("*"));
        assert_eq!(vt.xtype.as_deref(), Some("timestamp"));
    }
}
