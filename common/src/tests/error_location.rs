use crate::ErrorLocation;
use std::panic::Location;

#[track_caller]
fn capture_location() -> ErrorLocation {
    ErrorLocation::from(Location::caller())
}

/// **VALUE**: Verifies that the location points at the caller, not at the helper.
///
/// **WHY THIS MATTERS**: Every error in the bridge carries an `ErrorLocation`. If
/// `#[track_caller]` stops propagating, all of them report the constructor's
/// line and the location becomes noise.
///
/// **BUG THIS CATCHES**: Would catch `#[track_caller]` being dropped from an
/// error constructor or from `ErrorLocation::from()`.
#[test]
fn given_track_caller_helper_when_called_twice_then_lines_differ() {
    // GIVEN / WHEN: Two captures from consecutive lines
    let first = capture_location();
    let second = capture_location();

    // THEN: Same file, consecutive lines
    assert!(first.file.ends_with("error_location.rs"));
    assert_eq!(first.file, second.file);
    assert_eq!(first.line + 1, second.line);
    assert!(first.column > 0);
}

#[test]
fn given_error_location_when_formatted_then_produces_bracketed_format() {
    // GIVEN: A hand-built location
    let location = ErrorLocation {
        file: "src/call_tracker.rs",
        line: 42,
        column: 9,
    };

    // WHEN / THEN: Rendered as [file:line:column]
    assert_eq!(location.to_string(), "[src/call_tracker.rs:42:9]");
}
