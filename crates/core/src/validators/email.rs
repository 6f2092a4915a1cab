use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::session::Session;
use crate::domain::slot::SlotName;
use crate::errors::SlotError;
use crate::validators::SlotValidator;

static EMAIL_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern is valid")
});

pub fn is_email_shaped(value: &str) -> bool {
    EMAIL_SHAPE.is_match(value.trim())
}

#[derive(Clone, Copy, Debug, Default)]
pub struct EmailValidator;

#[async_trait]
impl SlotValidator for EmailValidator {
    fn slot(&self) -> SlotName {
        SlotName::Email
    }

    async fn validate(&self, raw: &str, _session: &Session) -> Result<String, SlotError> {
        let candidate = raw.trim();
        if is_email_shaped(candidate) {
            Ok(candidate.to_owned())
        } else {
            Err(SlotError::NormalizationFailure {
                slot: SlotName::Email,
                value: candidate.to_owned(),
            })
        }
    }
}
