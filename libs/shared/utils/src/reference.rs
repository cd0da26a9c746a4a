use uuid::Uuid;

pub const REFERENCE_NUMBER_LEN: usize = 8;

/// Short patient-facing booking reference, e.g. `3F9A1C0B`.
///
/// Uniqueness is enforced by the ledger, not here; callers regenerate on collision.
pub fn generate_reference_number() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(REFERENCE_NUMBER_LEN)
        .collect::<String>()
        .to_ascii_uppercase()
}
