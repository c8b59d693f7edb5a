//! owner-name helpers: normalisation, validation and canonical ordering

use std::cmp::Ordering;

/// Maximum length of a single label in bytes
pub const MAX_LABEL_LENGTH: usize = 63;

/// Maximum length of a full owner name in presentation form
pub const MAX_NAME_LENGTH: usize = 253;

/// Normalize an owner name to its canonical stored form: lowercase,
/// fully qualified, without the trailing dot. The root is the empty string.
pub fn normalize(name: &str) -> String {
    let trimmed = name.trim_end_matches('.');
    trimmed.to_lowercase()
}

/// Validate an owner name in its normalized form.
pub fn validate(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Ok(());
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(format!("name exceeds {} octets: {}", MAX_NAME_LENGTH, name));
    }
    for label in name.split('.') {
        if label.is_empty() {
            return Err(format!("empty label in name: {}", name));
        }
        if label.len() > MAX_LABEL_LENGTH {
            return Err(format!("label exceeds {} octets: {}", MAX_LABEL_LENGTH, label));
        }
        if label == "*" || label == "@" {
            continue;
        }
        if !label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(format!("invalid character in label: {}", label));
        }
    }
    Ok(())
}

/// Compare two normalized owner names in DNS canonical order: labels are
/// compared right to left, byte-wise, with the shorter name sorting first
/// when one is a proper suffix of the other.
pub fn canonical_cmp(a: &str, b: &str) -> Ordering {
    let a_labels: Vec<&str> = if a.is_empty() { Vec::new() } else { a.split('.').collect() };
    let b_labels: Vec<&str> = if b.is_empty() { Vec::new() } else { b.split('.').collect() };

    let mut ai = a_labels.iter().rev();
    let mut bi = b_labels.iter().rev();
    loop {
        match (ai.next(), bi.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match x.as_bytes().cmp(y.as_bytes()) {
                Ordering::Equal => continue,
                other => return other,
            },
        }
    }
}

/// Encode a normalized owner name into canonical (lowercase, uncompressed)
/// wire form.
pub fn to_wire(name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + 2);
    if !name.is_empty() {
        for label in name.split('.') {
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
    }
    out.push(0);
    out
}

/// The number of labels in a name, with a leading wildcard label excluded
/// as RFC 4034 requires for the RRSIG labels field.
pub fn label_count(name: &str) -> u8 {
    if name.is_empty() {
        return 0;
    }
    let mut count = name.split('.').count();
    if name.starts_with("*.") || name == "*" {
        count -= 1;
    }
    count as u8
}

/// Whether `name` is `apex` itself or a subdomain of it.
pub fn is_in_zone(name: &str, apex: &str) -> bool {
    if apex.is_empty() {
        return true;
    }
    name == apex || name.ends_with(&format!(".{}", apex))
}

/// The parent of a name, or None at the root.
pub fn parent(name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    match name.find('.') {
        Some(idx) => Some(name[idx + 1..].to_string()),
        None => Some(String::new()),
    }
}

/// Every name on the path from `owner` up to but excluding `apex`,
/// starting with `owner` itself. These are the names that may require
/// denial records (the non-owner entries being empty non-terminal
/// candidates).
pub fn names_toward_apex(owner: &str, apex: &str) -> Vec<String> {
    let mut out = Vec::new();
    if !is_in_zone(owner, apex) || owner == apex {
        return out;
    }
    let mut current = owner.to_string();
    while current != apex {
        out.push(current.clone());
        match parent(&current) {
            Some(p) => current = p,
            None => break,
        }
    }
    out
}
