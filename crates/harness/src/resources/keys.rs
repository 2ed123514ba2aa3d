use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetKeyError {
    #[error("asset key must not be empty")]
    Empty,
    #[error("asset key must not start with '/'")]
    LeadingSlash,
    #[error("asset key must not end with '/'")]
    TrailingSlash,
    #[error("asset key must not contain '\\\\'")]
    Backslash,
    #[error("asset key must not contain '..'")]
    ParentTraversal,
    #[error("asset key contains invalid character '{character}'")]
    InvalidCharacter { character: char },
}

pub(crate) fn validate_asset_key(key: &str) -> Result<(), AssetKeyError> {
    if key.is_empty() {
        return Err(AssetKeyError::Empty);
    }
    if key.starts_with('/') {
        return Err(AssetKeyError::LeadingSlash);
    }
    if key.ends_with('/') {
        return Err(AssetKeyError::TrailingSlash);
    }
    if key.contains('\\') {
        return Err(AssetKeyError::Backslash);
    }
    if key.contains("..") {
        return Err(AssetKeyError::ParentTraversal);
    }
    for ch in key.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '/' | '-' | '.') {
            continue;
        }
        return Err(AssetKeyError::InvalidCharacter { character: ch });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_keys() {
        for key in [
            "models/target.xml",
            "models/water_particle.xml",
            "a-b/c_d.xml",
            "Models/GripperGoal.xml",
        ] {
            assert!(validate_asset_key(key).is_ok(), "key={key}");
        }
    }

    #[test]
    fn rejects_invalid_keys() {
        for key in [
            "",
            "/a.xml",
            "models/",
            "..",
            "models/../secret.xml",
            r"models\target.xml",
            "models/targét.xml",
            "models/target glb",
        ] {
            assert!(validate_asset_key(key).is_err(), "key={key}");
        }
    }

    #[test]
    fn reports_offending_character() {
        assert_eq!(
            validate_asset_key("models/t+1.xml"),
            Err(AssetKeyError::InvalidCharacter { character: '+' })
        );
    }

    #[test]
    fn letter_range_ends_at_ascii_letters() {
        for ch in ['A', 'Z', 'a', 'z', '0', '9'] {
            let key = format!("models/{ch}.xml");
            assert!(validate_asset_key(&key).is_ok(), "key={key}");
        }
        for ch in ['@', '[', '`', '{', ':', '\u{c4}'] {
            let key = format!("models/{ch}.xml");
            assert_eq!(
                validate_asset_key(&key),
                Err(AssetKeyError::InvalidCharacter { character: ch }),
                "key={key}"
            );
        }
    }
}
