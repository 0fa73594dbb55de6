#[derive(Debug)]
pub enum Validity {
    Valid,
    Invalid(&'static str),
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        match self {
            Validity::Valid => true,
            Validity::Invalid(_) => false,
        }
    }
}

pub fn validate_email_address(email: &str) -> Validity {
    if email.chars().count() > 320 {
        return Validity::Invalid("Email address is too long.");
    }

    for c in email.chars() {
        if c == ' ' || !c.is_ascii() {
            return Validity::Invalid("Email address contains an invalid character.");
        }
    }

    if email.contains("@.") {
        return Validity::Invalid("Domain name in email address cannot begin with a period.");
    }

    let Some((username, domain)) = email.split_once('@') else {
        return Validity::Invalid("Email address must contain an at symbol (@).");
    };

    if username.is_empty() || domain.len() < 3 {
        return Validity::Invalid("Email username or domain name is too short.");
    }

    if domain.contains('@') || !domain.contains('.') {
        return Validity::Invalid(
            "Email address must have only one at symbol (@) and the domain must contain a period.",
        );
    }

    if domain.ends_with('.') {
        return Validity::Invalid("Email address cannot end with a period.");
    }

    Validity::Valid
}
