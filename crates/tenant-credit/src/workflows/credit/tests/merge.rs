use proptest::collection::{btree_map, vec};
use proptest::prelude::*;

use crate::workflows::credit::record::{merge, CaseField, CaseRecord, FieldValue, PartialRecord};

const KEYS: [&str; 5] = [
    "client_name",
    "monthly_rent",
    "bureau_score",
    "fiscal_years",
    "analyst_note",
];

fn field_value() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        (-1.0e6..1.0e6f64).prop_map(FieldValue::Number),
        "[ a-z0-9.,]{0,6}".prop_map(FieldValue::Text),
        vec("[0-9]{1,4}", 0..3).prop_map(FieldValue::Series),
    ]
}

fn partial_record() -> impl Strategy<Value = PartialRecord> {
    btree_map(prop::sample::select(KEYS.to_vec()), field_value(), 0..KEYS.len()).prop_map(
        |fields| {
            fields
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect::<PartialRecord>()
        },
    )
}

proptest! {
    #[test]
    fn merging_the_same_updates_twice_changes_nothing(
        seed in partial_record(),
        updates in partial_record(),
    ) {
        let mut once = CaseRecord::from_updates(&seed);
        merge(&mut once, &updates);

        let mut twice = once.clone();
        merge(&mut twice, &updates);

        prop_assert_eq!(once, twice);
    }

    #[test]
    fn populated_fields_are_never_blanked(
        seed in partial_record(),
        updates in partial_record(),
    ) {
        let before = CaseRecord::from_updates(&seed);
        let mut after = before.clone();
        merge(&mut after, &updates);

        for (key, value) in before.iter().filter(|(_, value)| !value.is_empty()) {
            let merged = after.get(key).expect("populated key survives merge");
            prop_assert!(!merged.is_empty());
            if updates.get(key).map_or(true, FieldValue::is_empty) {
                prop_assert_eq!(merged, value);
            }
        }
    }

    #[test]
    fn empty_updates_leave_the_record_untouched(seed in partial_record()) {
        let before = CaseRecord::from_updates(&seed);
        let mut after = before.clone();

        let summary = merge(&mut after, &PartialRecord::new());

        prop_assert_eq!(after, before);
        prop_assert!(summary.written.is_empty());
    }
}

#[test]
fn summary_reports_written_and_kept_keys() {
    let mut record = CaseRecord::from_updates(
        &PartialRecord::new()
            .with(CaseField::ClientName, "Acme")
            .with(CaseField::TaxId, "   "),
    );

    let summary = merge(
        &mut record,
        &PartialRecord::new()
            .with(CaseField::ClientName, "")
            .with(CaseField::TaxId, "12.345.678/0001-90"),
    );

    assert_eq!(summary.written, vec!["tax_id".to_string()]);
    assert_eq!(summary.kept, vec!["client_name".to_string()]);
    assert_eq!(record.get("client_name"), Some(&FieldValue::text("Acme")));
}
