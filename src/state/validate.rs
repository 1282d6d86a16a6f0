use crate::state::{OrchestratorState, MAX_HISTORY_DEPTH, STATE_SCHEMA_VERSION};

pub const HASH_PREFIX: &str = "sha256:";

pub fn is_valid_hash(value: &str) -> bool {
    match value.strip_prefix(HASH_PREFIX) {
        Some(hex) => {
            hex.len() == 64
                && hex
                    .chars()
                    .all(|ch| ch.is_ascii_digit() || ('a'..='f').contains(&ch))
        }
        None => false,
    }
}

pub fn validate_state(state: &OrchestratorState) -> Result<(), String> {
    if state.version != STATE_SCHEMA_VERSION {
        return Err(format!(
            "unsupported version `{}`; expected `{STATE_SCHEMA_VERSION}`",
            state.version
        ));
    }

    if let Some(name) = state
        .completed_sections
        .intersection(&state.failed_sections)
        .next()
    {
        return Err(format!(
            "`{name}` is listed as both completed and failed"
        ));
    }

    for (path, hash) in &state.file_hashes {
        if !is_valid_hash(hash) {
            return Err(format!("file hash for `{path}` is malformed"));
        }
    }

    for (name, history) in &state.health_history {
        if history.len() > MAX_HISTORY_DEPTH {
            return Err(format!(
                "health history for `{name}` has {} entries; limit is {MAX_HISTORY_DEPTH}",
                history.len()
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_format_requires_prefix_and_lowercase_hex() {
        let hex = "a".repeat(64);
        assert!(is_valid_hash(&format!("sha256:{hex}")));
        assert!(!is_valid_hash(&hex));
        assert!(!is_valid_hash(&format!("sha256:{}", "A".repeat(64))));
        assert!(!is_valid_hash(&format!("sha256:{}", "a".repeat(63))));
        assert!(!is_valid_hash("md5:abc"));
    }

    #[test]
    fn overlapping_sections_are_rejected() {
        let mut state = OrchestratorState::default();
        state.completed_sections.insert("dns".to_string());
        state.failed_sections.insert("dns".to_string());
        let err = validate_state(&state).expect_err("overlap rejected");
        assert!(err.contains("dns"));
    }
}
