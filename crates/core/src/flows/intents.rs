//! Free-text intent detection for the root menus.
//!
//! Matching is substring based and checked in a fixed order, so overlapping words resolve to the
//! first rule that fires: "Nodejs" reads as a decline at the skill menu because it contains "NO".

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RootIntent {
    Add,
    Update,
    Decline,
    Refresh,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AvailabilityIntent {
    Greeting,
    Confirm,
    Deny,
    Unknown,
}

pub fn classify_root(input: &str) -> RootIntent {
    let upper = input.to_uppercase();
    if upper.contains("ADD") {
        RootIntent::Add
    } else if upper.contains("UPDATE") {
        RootIntent::Update
    } else if upper.contains("NO") {
        RootIntent::Decline
    } else {
        RootIntent::Refresh
    }
}

/// The greeting check is case-sensitive; the yes/no checks are not.
pub fn classify_availability(input: &str) -> AvailabilityIntent {
    let upper = input.to_uppercase();
    if input.contains("hello") {
        AvailabilityIntent::Greeting
    } else if upper.contains("YES") {
        AvailabilityIntent::Confirm
    } else if upper.contains("NO") {
        AvailabilityIntent::Deny
    } else {
        AvailabilityIntent::Unknown
    }
}

pub fn is_affirmative(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case("yes")
}

pub fn is_back(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case("back")
}

/// Case-insensitive equality used for group and skill names coming back from select menus or
/// typed by hand.
pub fn names_match(input: &str, name: &str) -> bool {
    input.trim().to_uppercase() == name.to_uppercase()
}
