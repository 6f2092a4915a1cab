use enrollment_core::domain::confirmation::ConfirmationRecord;
use enrollment_core::domain::language::Language;
use tera::{Context, Tera};
use thiserror::Error;

const TEMPLATES: &[(&str, &str)] = &[
    ("it/subject.txt", include_str!("../../../templates/confirmation/it/subject.txt")),
    ("it/body.txt", include_str!("../../../templates/confirmation/it/body.txt")),
    ("it/forward.txt", include_str!("../../../templates/confirmation/it/forward.txt")),
    ("en/subject.txt", include_str!("../../../templates/confirmation/en/subject.txt")),
    ("en/body.txt", include_str!("../../../templates/confirmation/en/body.txt")),
    ("en/forward.txt", include_str!("../../../templates/confirmation/en/forward.txt")),
];

#[derive(Debug, Error)]
#[error("template error: {0}")]
pub struct TemplateError(String);

impl From<tera::Error> for TemplateError {
    fn from(error: tera::Error) -> Self {
        Self(error.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

/// Confirmation subject/body templates, one set per language.
#[derive(Clone, Debug)]
pub struct ConfirmationTemplates {
    tera: Tera,
}

impl ConfirmationTemplates {
    pub fn embedded() -> Result<Self, TemplateError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        Ok(Self { tera })
    }

    pub fn render(&self, record: &ConfirmationRecord) -> Result<RenderedMessage, TemplateError> {
        let language = record.language();
        let context = Context::from_serialize(record)?;
        let subject = self.tera.render(&template_name(language, "subject"), &context)?;
        let body = self.tera.render(&template_name(language, "body"), &context)?;
        Ok(RenderedMessage { subject: subject.trim().to_owned(), body })
    }

    /// Operator copy of a rendered confirmation, noting whom it was sent for.
    pub fn render_forward(
        &self,
        record: &ConfirmationRecord,
        message: &RenderedMessage,
    ) -> Result<RenderedMessage, TemplateError> {
        let mut context = Context::new();
        context.insert("contact_email", record.contact_email());
        context.insert("body", &message.body);
        let body = self.tera.render(&template_name(record.language(), "forward"), &context)?;
        Ok(RenderedMessage { subject: message.subject.clone(), body })
    }
}

fn template_name(language: Language, part: &str) -> String {
    format!("{}/{part}.txt", language.code())
}
