use tracing::info;

use crate::error::AppError;

const VERIFICATION_TEMPLATE: &str =
    "Hi {name} 🌱 your EcoTrack verification code is {code}. It expires in 15 minutes.";

/// Outbound mail stub. Delivery is mocked: rendered messages go to the log,
/// which is where the verification code is picked up during development.
#[derive(Clone, Default)]
pub struct MailerService;

impl MailerService {
    pub fn new() -> Self {
        Self
    }

    pub async fn send_verification_code(
        &self,
        email: &str,
        name: &str,
        code: &str,
    ) -> Result<(), AppError> {
        let message = render_template(VERIFICATION_TEMPLATE, name, code);
        info!(recipient = %email, "verification mail queued: {message}");
        Ok(())
    }
}

fn render_template(template: &str, name: &str, code: &str) -> String {
    let mut message = template.to_string();
    message = message.replace("{name}", name);
    message = message.replace("{code}", code);
    message
}
