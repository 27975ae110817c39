// Identifier generation for stored records and human-facing references.

pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Short uppercase reference such as `DSP-1A2B3C4D`.
pub fn generate_reference(prefix: &str) -> String {
    let simple = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", simple[..8].to_ascii_uppercase())
}
