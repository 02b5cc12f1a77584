//! Proptest strategies.

use crate::fixtures::{complete_xml, event_xml, summary_xml, SAMPLE_CNPJ};
use nfesync_protocol::EVENT_LABELS;
use proptest::prelude::*;

/// Arbitrary 44-digit access keys issued by [`SAMPLE_CNPJ`] in SP.
pub fn access_key() -> impl Strategy<Value = String> {
    "[0-9]{24}".prop_map(|tail| format!("352406{SAMPLE_CNPJ}{tail}"))
}

/// Schema and XML of an arbitrary feed document for `key`.
pub fn feed_document(key: String) -> impl Strategy<Value = (String, String)> {
    let events = EVENT_LABELS.len();
    prop_oneof![
        Just(("resNFe_v1.01.xsd".to_string(), summary_xml(&key))),
        Just(("procNFe_v4.00.xsd".to_string(), complete_xml(&key))),
        (0..events, 1u32..4).prop_map(move |(i, seq)| {
            (
                "procEventoNFe_v1.00.xsd".to_string(),
                event_xml(&key, EVENT_LABELS[i].0, seq),
            )
        }),
    ]
}

/// Page boundaries: a strictly increasing list of `ultNSU` values ending at the tip.
pub fn page_marks(max_pages: usize) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::btree_set(1u64..10_000, 1..=max_pages)
        .prop_map(|marks| marks.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn keys_are_44_digits(key in access_key()) {
            prop_assert_eq!(key.len(), 44);
            prop_assert!(nfesync_protocol::AccessKey::parse(&key).is_ok());
        }

        #[test]
        fn marks_increase(marks in page_marks(12)) {
            prop_assert!(!marks.is_empty());
            prop_assert!(marks.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
