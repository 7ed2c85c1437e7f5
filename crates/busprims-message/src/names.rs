//! Validation of paths and names used in message headers.

use crate::error::{MessageError, Result};

const MAX_NAME_LEN: usize = 255;
/// Header strings carry a 16-bit length on the wire.
pub const MAX_PATH_LEN: usize = u16::MAX as usize;

fn is_element_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// `/` or `/seg/seg` where segments are non-empty `[A-Za-z0-9_]`.
pub fn validate_path(path: &str) -> Result<()> {
    let invalid = || MessageError::InvalidPath(path.to_string());
    if path.len() > MAX_PATH_LEN {
        return Err(invalid());
    }
    if path == "/" {
        return Ok(());
    }
    let rest = path.strip_prefix('/').ok_or_else(invalid)?;
    if rest.split('/').all(|seg| !seg.is_empty() && seg.chars().all(is_element_char)) {
        Ok(())
    } else {
        Err(invalid())
    }
}

/// Two or more dot-separated elements, none empty or starting with a digit.
fn is_dotted_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return false;
    }
    let elements: Vec<&str> = name.split('.').collect();
    elements.len() >= 2
        && elements.iter().all(|el| {
            el.chars().next().is_some_and(|c| !c.is_ascii_digit())
                && el.chars().all(is_element_char)
        })
}

pub fn validate_interface(name: &str) -> Result<()> {
    if is_dotted_name(name) {
        Ok(())
    } else {
        Err(MessageError::InvalidInterface(name.to_string()))
    }
}

pub fn validate_error_name(name: &str) -> Result<()> {
    if is_dotted_name(name) {
        Ok(())
    } else {
        Err(MessageError::InvalidErrorName(name.to_string()))
    }
}

pub fn validate_member(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name.chars().next().is_some_and(|c| !c.is_ascii_digit())
        && name.chars().all(is_element_char);
    if valid {
        Ok(())
    } else {
        Err(MessageError::InvalidMember(name.to_string()))
    }
}

/// Well-known names (`test.method.server`) or unique names (`:1.7`).
pub fn validate_bus_name(name: &str) -> Result<()> {
    let invalid = || MessageError::InvalidBusName(name.to_string());
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(invalid());
    }
    if let Some(unique) = name.strip_prefix(':') {
        let valid = unique.contains('.')
            && unique
                .split('.')
                .all(|el| !el.is_empty() && el.chars().all(|c| is_element_char(c) || c == '-'));
        return if valid { Ok(()) } else { Err(invalid()) };
    }
    let elements: Vec<&str> = name.split('.').collect();
    let valid = elements.len() >= 2
        && elements.iter().all(|el| {
            el.chars().next().is_some_and(|c| !c.is_ascii_digit())
                && el.chars().all(|c| is_element_char(c) || c == '-')
        });
    if valid {
        Ok(())
    } else {
        Err(invalid())
    }
}

pub fn is_unique_name(name: &str) -> bool {
    name.starts_with(':')
}
