use crate::MaskedNumber;

/// **VALUE**: Verifies that only the last three digits survive masking.
///
/// **WHY THIS MATTERS**: Caller numbers are logged for every event. The log file
/// must not become a list of who called whom.
///
/// **BUG THIS CATCHES**: Would catch `Display` or `Debug` printing the raw value.
#[test]
fn given_formatted_number_when_displayed_then_only_last_digits_visible() {
    // GIVEN: A number with separators and a plus sign
    let number = MaskedNumber::new("+49 (89) 1234-5678");

    // WHEN: Rendering it every way a logger might
    let display = number.to_string();
    let debug = format!("{number:?}");

    // THEN: Digits are masked except the last three
    assert_eq!(display, "*********678");
    assert!(debug.contains("*********678"));
    assert!(!debug.contains("1234"));
    assert_eq!(number.as_str(), "+49 (89) 1234-5678");
}

#[test]
fn given_short_or_empty_number_when_masked_then_never_panics() {
    assert_eq!(MaskedNumber::new("12").masked(), "12");
    assert_eq!(MaskedNumber::new("").masked(), "<none>");
    assert_eq!(MaskedNumber::new("anonymous").masked(), "<none>");
}
