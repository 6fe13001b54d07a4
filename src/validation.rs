const MAX_SHAPE_NAME_LEN: usize = 64;
const MAX_USER_NAME_LEN: usize = 64;
const MAX_APPLICATION_NAME_LEN: usize = 100;

fn is_valid_name_char(c: char, allow_period: bool) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || (allow_period && c == '.')
}

fn validate_name(
    name: &str,
    entity: &str,
    max_len: usize,
    allow_period: bool,
    forbid_leading_special: bool,
) -> Result<(), String> {
    if name.is_empty() {
        return Err(format!("{entity} name cannot be empty"));
    }
    if name.len() > max_len {
        return Err(format!("{entity} name cannot exceed {max_len} characters"));
    }
    if !name.chars().all(|c| is_valid_name_char(c, allow_period)) {
        let mut allowed = "alphanumeric characters, hyphens, and underscores".to_string();
        if allow_period {
            allowed.push_str(", and periods");
        }
        return Err(format!("{entity} name can only contain {allowed}"));
    }
    if forbid_leading_special && (name.starts_with('-') || name.starts_with('_')) {
        return Err(format!(
            "{entity} name cannot start with a hyphen or underscore"
        ));
    }
    Ok(())
}

/// Shape names double as storage table suffixes, so periods are not allowed.
pub fn validate_shape_name(name: &str) -> Result<(), String> {
    validate_name(name, "Repo", MAX_SHAPE_NAME_LEN, false, true)
}

pub fn validate_user_name(name: &str) -> Result<(), String> {
    validate_name(name, "User", MAX_USER_NAME_LEN, true, true)
}

pub fn validate_application_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Application name cannot be empty".to_string());
    }
    if name.len() > MAX_APPLICATION_NAME_LEN {
        return Err(format!(
            "Application name cannot exceed {MAX_APPLICATION_NAME_LEN} characters"
        ));
    }
    Ok(())
}
