// Schema invariants that queries rely on but nothing else would catch at
// compile time.

const INITIAL: &str = include_str!("../migrations/0001_initial.sql");

fn table(name: &str) -> &'static str {
    let start = INITIAL
        .find(&format!("CREATE TABLE {name} ("))
        .unwrap_or_else(|| panic!("{name} missing from initial migration"));
    let end = INITIAL[start..].find(");").expect("unterminated table") + start;
    &INITIAL[start..end]
}

/// Removing a member must never erase shifts or audit rows. The shift and
/// log tables reference members with RESTRICT so a delete is rejected while
/// history exists; the route layer reports that as a conflict.
#[test]
fn member_references_never_cascade() {
    let shifts = table("shifts");
    for column in ["original_owner_id", "posted_by_id", "claimed_by_id"] {
        let line = shifts
            .lines()
            .find(|l| l.trim_start().starts_with(column))
            .unwrap_or_else(|| panic!("{column} missing from shifts"));
        assert!(
            line.contains("REFERENCES members(id) ON DELETE RESTRICT"),
            "shifts.{column} must RESTRICT member deletion: {line}"
        );
    }

    let logs = table("shift_swap_logs");
    let actor = logs
        .lines()
        .find(|l| l.trim_start().starts_with("actor_id"))
        .expect("actor_id missing from shift_swap_logs");
    assert!(
        actor.contains("REFERENCES members(id) ON DELETE RESTRICT"),
        "shift_swap_logs.actor_id must RESTRICT member deletion: {actor}"
    );
}

/// The audit table is append-only; the version column is the concurrency
/// token and must exist with a zero default.
#[test]
fn shifts_carry_the_version_token() {
    let shifts = table("shifts");
    assert!(shifts.contains("version BIGINT NOT NULL DEFAULT 0"));
    let logs = table("shift_swap_logs");
    assert!(!logs.contains("updated_at"), "audit rows are never updated");
}
