use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        LaminaError::out_of_memory("x")
            .to_string()
            .contains("out of memory:")
    );
    assert!(LaminaError::range("x").to_string().contains("range error:"));
    assert!(
        LaminaError::invalid_state("x")
            .to_string()
            .contains("invalid state:")
    );
    assert!(
        LaminaError::unsupported_color_space("x")
            .to_string()
            .contains("unsupported color space:")
    );
    assert!(
        LaminaError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn only_out_of_memory_is_retryable() {
    assert!(LaminaError::out_of_memory("x").is_out_of_memory());
    assert!(!LaminaError::range("x").is_out_of_memory());
    assert!(!LaminaError::invalid_state("x").is_out_of_memory());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = LaminaError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn json_errors_map_to_serde() {
    let err: LaminaError = serde_json::from_str::<u32>("nope").unwrap_err().into();
    assert!(matches!(err, LaminaError::Serde(_)));
}
