use crate::contact_index::{ContactIndex, SharedContactIndex};
use crate::normalizer::PhoneNormalizer;
use crate::tests::contact;

#[test]
fn given_empty_contact_list_when_built_then_lookup_finds_nothing() {
    // GIVEN: An index built from no contacts
    let normalizer = PhoneNormalizer::default();
    let index = ContactIndex::build(Vec::new(), &normalizer);

    // WHEN: Looking up any number
    let found = index.lookup(&normalizer.normalize("+49 89 12345678"));

    // THEN: No matches
    assert!(found.is_empty());
    assert!(index.is_empty());
}

/// **VALUE**: Contacts without usable phone data must not become wildcards.
///
/// **WHY THIS MATTERS**: Withheld callers arrive with an empty number. If the
/// empty key were indexed, every anonymous call would match whichever contact
/// has a blank phone field.
///
/// **BUG THIS CATCHES**: Would catch removing the empty-key filter from `build`.
#[test]
fn given_contacts_with_blank_numbers_when_built_then_empty_key_matches_nothing() {
    // GIVEN: Contacts whose numbers have no digits
    let normalizer = PhoneNormalizer::default();
    let index = ContactIndex::build(
        vec![contact("a", &["", "n/a"]), contact("b", &["089 12345678"])],
        &normalizer,
    );

    // WHEN: Looking up an empty number
    let found = index.lookup(&normalizer.normalize(""));

    // THEN: Nothing matches, but the contact is still known by id
    assert!(found.is_empty());
    assert_eq!(index.key_count(), 1);
    assert!(index.get("a").is_some());
}

#[test]
fn given_contacts_sharing_a_suffix_when_looked_up_then_all_are_returned_in_list_order() {
    // GIVEN: Two contacts whose numbers share the trailing 10 digits
    let normalizer = PhoneNormalizer::default();
    let index = ContactIndex::build(
        vec![
            contact("first", &["+49 89 12345678"]),
            contact("other", &["+49 30 5555555"]),
            contact("second", &["089 12345678"]),
        ],
        &normalizer,
    );

    // WHEN: Looking up the shared number
    let found = index.lookup(&normalizer.normalize("0049 89 12345678"));

    // THEN: Both are returned in input order
    let ids: Vec<&str> = found.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["first", "second"]);
}

#[test]
fn given_contact_with_two_spellings_of_one_number_when_built_then_registered_once() {
    // GIVEN: One contact listing the same number twice
    let normalizer = PhoneNormalizer::default();
    let index = ContactIndex::build(
        vec![contact("a", &["+49 89 12345678", "089-12345678"])],
        &normalizer,
    );

    // WHEN: Looking it up
    let found = index.lookup(&normalizer.normalize("8912345678"));

    // THEN: The contact appears once
    assert_eq!(found.len(), 1);
}

/// **VALUE**: A reload never disturbs readers holding the old index.
///
/// **WHY THIS MATTERS**: Call matching runs while the background loader swaps
/// in a new directory. A reader must see either the old or the new index.
///
/// **BUG THIS CATCHES**: Would catch `replace` mutating the existing index in
/// place instead of swapping the pointer.
#[tokio::test]
async fn given_snapshot_taken_when_index_replaced_then_old_snapshot_is_unchanged() {
    // GIVEN: A shared index with one contact and a snapshot of it
    let normalizer = PhoneNormalizer::default();
    let shared = SharedContactIndex::new(ContactIndex::build(
        vec![contact("old", &["089 12345678"])],
        &normalizer,
    ));
    let before = shared.snapshot().await;

    // WHEN: Replacing the index
    shared
        .replace(ContactIndex::build(
            vec![contact("new", &["030 5555555"]), contact("newer", &["040 1234"])],
            &normalizer,
        ))
        .await;

    // THEN: The old snapshot is intact and new snapshots see the new index
    assert!(before.get("old").is_some());
    assert_eq!(before.contact_count(), 1);

    let after = shared.snapshot().await;
    assert!(after.get("old").is_none());
    assert_eq!(after.contact_count(), 2);
}
