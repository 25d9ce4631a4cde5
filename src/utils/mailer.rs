// src/utils/mailer.rs

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor, message::Mailbox,
    transport::smtp::authentication::Credentials,
};
use rand::Rng;

use crate::{
    config::{CODE_EXPIRE_MINUTES, CODE_LENGTH, Config},
    error::AppError,
};

/// Outbound email for verification codes.
///
/// When SMTP is not configured, or sending is switched off with
/// EMAIL_SEND_DISABLED, the code is logged instead of sent. Local runs and
/// the integration tests rely on that mode.
#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<Mailbox>,
}

pub fn sending_disabled() -> bool {
    std::env::var("EMAIL_SEND_DISABLED")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

impl Mailer {
    pub fn disabled() -> Self {
        Self {
            transport: None,
            from: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        if sending_disabled() {
            return Self::disabled();
        }

        let (Some(server), Some(username), Some(password), Some(from)) = (
            &config.smtp_server,
            &config.smtp_username,
            &config.smtp_password,
            &config.smtp_from,
        ) else {
            tracing::info!("SMTP not configured; verification codes will be logged");
            return Self::disabled();
        };

        let from: Mailbox = match from.parse() {
            Ok(mailbox) => mailbox,
            Err(err) => {
                tracing::warn!("Invalid SMTP_FROM address, mailer disabled: {}", err);
                return Self::disabled();
            }
        };

        let transport = match AsyncSmtpTransport::<Tokio1Executor>::relay(server) {
            Ok(builder) => builder
                .credentials(Credentials::new(username.clone(), password.clone()))
                .build(),
            Err(err) => {
                tracing::warn!("Invalid SMTP server, mailer disabled: {}", err);
                return Self::disabled();
            }
        };

        Self {
            transport: Some(transport),
            from: Some(from),
        }
    }

    pub async fn send_verification_code(
        &self,
        recipient_email: &str,
        recipient_name: &str,
        code: &str,
    ) -> Result<(), AppError> {
        let (Some(transport), Some(from)) = (&self.transport, &self.from) else {
            tracing::info!(
                "Email sending disabled; verification code for {} is {}",
                recipient_email,
                code
            );
            return Ok(());
        };

        let to: Mailbox = format!("{} <{}>", recipient_name, recipient_email)
            .parse()
            .map_err(|_| AppError::BadRequest("Invalid recipient email address".to_string()))?;

        let body = format!(
            "Hello {},\n\nYour Quizer verification code is {}.\nIt expires in {} minutes.\n",
            recipient_name, code, CODE_EXPIRE_MINUTES
        );

        let email = Message::builder()
            .from(from.clone())
            .to(to)
            .subject("Quizer verification code")
            .body(body)
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        transport
            .send(email)
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        Ok(())
    }
}

/// Generates a numeric verification code of CODE_LENGTH digits.
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| {
            let digit: u8 = rng.random_range(0..10);
            char::from(b'0' + digit)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_has_expected_shape() {
        let code = generate_code();
        assert_eq!(code.len(), CODE_LENGTH);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn codes_vary() {
        let codes: std::collections::HashSet<String> = (0..20).map(|_| generate_code()).collect();
        assert!(codes.len() > 1);
    }
}
