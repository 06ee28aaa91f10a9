//! Property tests for record invariants, IM cleaning and fingerprints.

use gcontact::fingerprint::{hamming_distance, FingerprintIndex, IndexSettings};
use gcontact::models::{ImHandle, Phone};
use gcontact::normalize::{clean_ims, default_home_domains, normalize_protocol};
use gcontact::{ContactRecord, Fingerprint};
use proptest::prelude::*;

fn protocol() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("aim".to_string()),
        Just("Google Talk".to_string()),
        Just("gtalk".to_string()),
        Just("skype".to_string()),
        Just("ICQ chat".to_string()),
        Just("jabber".to_string()),
        Just("http://schemas.google.com/g/2005#QQ".to_string()),
        "[a-z_-]{0,8}",
    ]
}

fn im() -> impl Strategy<Value = ImHandle> {
    (prop::sample::select(vec!["a@x.com", "b@y.org", "handle"]), protocol())
        .prop_map(|(address, protocol)| ImHandle::new(address.to_string(), protocol))
}

proptest! {
    #[test]
    fn at_most_one_primary_email(
        inserts in prop::collection::vec(("[a-c]@(acme|gmail)\\.com", any::<bool>()), 0..20)
    ) {
        let home = default_home_domains();
        let mut record = ContactRecord::new("p/1", "Prop Test");
        for (address, primary) in &inserts {
            record.insert_email(address, *primary, None, &home);
        }
        let primaries = record.emails().iter().filter(|e| e.is_primary).count();
        prop_assert!(primaries <= 1);
    }

    #[test]
    fn at_most_one_primary_phone(
        inserts in prop::collection::vec(("555-000[0-3]", any::<bool>()), 0..20)
    ) {
        let mut record = ContactRecord::new("p/2", "Prop Test");
        for (number, primary) in &inserts {
            let mut phone = Phone::new(number.clone());
            phone.is_primary = *primary;
            record.insert_phone(phone);
        }
        let primaries = record.phones().iter().filter(|p| p.is_primary).count();
        prop_assert!(primaries <= 1);
    }

    #[test]
    fn clean_ims_is_idempotent(ims in prop::collection::vec(im(), 0..12)) {
        let once = clean_ims(&ims);
        let twice = clean_ims(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn normalize_protocol_is_idempotent(raw in protocol()) {
        let once = normalize_protocol(&raw);
        prop_assert_eq!(normalize_protocol(&once), once);
    }

    #[test]
    fn fingerprints_are_deterministic(text in "[a-z ]{0,40}", bits in 1u32..=64) {
        let a = Fingerprint::from_text(&text, bits, "a");
        let b = Fingerprint::from_text(&text, bits, "b");
        prop_assert_eq!(a.value(), b.value());
        prop_assert_eq!(a.distance(&b), 0);
        if bits < 64 {
            prop_assert!(a.value() < (1u64 << bits));
        }
    }

    #[test]
    fn index_finds_every_close_value(base in any::<u64>(), flips in prop::collection::btree_set(0u32..64, 0..=3)) {
        let mut near = base;
        for bit in &flips {
            near ^= 1u64 << bit;
        }

        let mut index = FingerprintIndex::new(IndexSettings::default()).unwrap();
        index.insert(Fingerprint::from_value(near, 64, "near"));

        let query = Fingerprint::from_value(base, 64, "query");
        let found: Vec<_> = index.find_duplicates(&query).with_distance().collect();
        prop_assert_eq!(found.len(), 1);
        prop_assert_eq!(found[0].distance, hamming_distance(base, near));
    }
}
