//! Embedding input text for a tender.

use crate::record::TenderRecord;

/// Identifies the field order and separator used by [`compose`].
///
/// Persisted with every partition. Bump it whenever `compose` changes so
/// stored vectors are rebuilt instead of reused.
pub const COMPOSER_VERSION: u32 = 1;

/// Join the searchable fields of a record into one embedding input.
///
/// Fields appear in the order title, procurement type, entity, sector,
/// financial year, deadline, separated by a single space. Empty fields
/// still contribute their separator.
pub fn compose(record: &TenderRecord) -> String {
    [
        record.title.as_str(),
        record.procurement_type.as_str(),
        record.entity.as_str(),
        record.sector.as_str(),
        record.financial_year.as_str(),
        record.deadline.as_str(),
    ]
    .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record() -> TenderRecord {
        TenderRecord {
            id: 1,
            title: "Construction of Gulu road".to_string(),
            procurement_type: "Works".to_string(),
            entity: "UNRA".to_string(),
            sector: "Transport".to_string(),
            financial_year: "2024-2025".to_string(),
            deadline: "2025-01-31".to_string(),
            estimated_value: Some(10.0),
        }
    }

    #[test]
    fn test_field_order_and_separator() {
        assert_eq!(
            compose(&record()),
            "Construction of Gulu road Works UNRA Transport 2024-2025 2025-01-31"
        );
    }

    #[test]
    fn test_empty_fields_keep_their_slot() {
        let mut r = record();
        r.entity.clear();
        r.deadline.clear();
        assert_eq!(compose(&r), "Construction of Gulu road Works  Transport 2024-2025 ");
    }

    #[test]
    fn test_estimated_value_is_not_embedded() {
        let mut r = record();
        r.estimated_value = None;
        assert_eq!(compose(&r), compose(&record()));
    }
}
