use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl FieldError {
    pub fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuestContact {
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub whatsapp: String,
}

impl GuestContact {
    /// Checks for the public booking flow, where every field is required.
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = vec![];
        if self.name.trim().chars().count() < 2 {
            errors.push(FieldError::new("guest_name", "name must have at least 2 characters"));
        }
        if !is_valid_email(self.email.trim()) {
            errors.push(FieldError::new("guest_email", "invalid email address"));
        }
        if digit_count(&self.whatsapp) < 8 {
            errors.push(FieldError::new("guest_whatsapp", "whatsapp must have at least 8 digits"));
        }
        errors
    }

    /// Admin entry only needs a name; email and whatsapp are checked when given.
    pub fn validate_manual(&self) -> Vec<FieldError> {
        let mut errors = vec![];
        if self.name.trim().chars().count() < 2 {
            errors.push(FieldError::new("guest_name", "name must have at least 2 characters"));
        }
        let email = self.email.trim();
        if !email.is_empty() && !is_valid_email(email) {
            errors.push(FieldError::new("guest_email", "invalid email address"));
        }
        if !self.whatsapp.trim().is_empty() && digit_count(&self.whatsapp) < 8 {
            errors.push(FieldError::new("guest_whatsapp", "whatsapp must have at least 8 digits"));
        }
        errors
    }

    /// Trimmed copy with the phone number normalized for storage.
    pub fn normalized(&self) -> GuestContact {
        GuestContact {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            whatsapp: normalize_phone(&self.whatsapp),
        }
    }
}

fn digit_count(s: &str) -> usize {
    s.chars().filter(|c| c.is_ascii_digit()).count()
}

fn is_valid_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || s.chars().any(char::is_whitespace) {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Strips formatting characters, keeping a leading '+'.
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut out = String::with_capacity(trimmed.len());
    if trimmed.starts_with('+') {
        out.push('+');
    }
    out.extend(trimmed.chars().filter(|c| c.is_ascii_digit()));
    out
}
