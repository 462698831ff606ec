//! Transactional email via Resend.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Error type for email delivery.
#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected the message.
    #[error("email API error ({status}): {message}")]
    Api {
        /// HTTP status returned by the provider.
        status: u16,
        /// Provider message.
        message: String,
    },
}

/// An outgoing email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html: String,
}

impl Email {
    /// Email address verification message.
    #[must_use]
    pub fn verification(to: &str, app_url: &str, token: &str) -> Self {
        let link = format!("{app_url}/auth/verify?token={token}");
        Self {
            to: to.to_string(),
            subject: "Verify your email".into(),
            html: format!("<p>Click <a href=\"{link}\">here</a> to verify your email.</p>"),
        }
    }

    /// Password reset message.
    #[must_use]
    pub fn password_reset(to: &str, app_url: &str, token: &str) -> Self {
        let link = format!("{app_url}/auth/reset-password?token={token}");
        Self {
            to: to.to_string(),
            subject: "Reset your password".into(),
            html: format!("<p>Click <a href=\"{link}\">here</a> to reset your password.</p>"),
        }
    }

    /// Team invitation message.
    #[must_use]
    pub fn team_invite(to: &str, app_url: &str, organization_name: &str, token: &str) -> Self {
        let link = format!("{app_url}/invite/{token}");
        let org = escape_html(organization_name);
        Self {
            to: to.to_string(),
            subject: format!("You've been invited to {organization_name}"),
            html: format!(
                "<p>You've been invited to join {org} on MetricFlow. Click <a href=\"{link}\">here</a> to accept.</p>"
            ),
        }
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Something that can deliver an [`Email`].
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one message.
    async fn send(&self, email: &Email) -> Result<(), MailerError>;
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct ResendErrorResponse {
    #[serde(default)]
    message: String,
}

/// Resend HTTP API client.
#[derive(Debug, Clone)]
pub struct ResendMailer {
    client: Client,
    api_key: String,
    from: String,
    base_url: String,
}

impl ResendMailer {
    /// Resend API base URL.
    const BASE_URL: &'static str = "https://api.resend.com";

    /// Create a mailer sending as `from`.
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Result<Self, MailerError> {
        Self::with_base_url(api_key, from, Self::BASE_URL)
    }

    /// Create a mailer against a different API root (used by tests).
    pub fn with_base_url(
        api_key: impl Into<String>,
        from: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, MailerError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            from: from.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &Email) -> Result<(), MailerError> {
        let request = SendRequest {
            from: &self.from,
            to: [&email.to],
            subject: &email.subject,
            html: &email.html,
        };

        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(subject = %email.subject, "Email sent");
            return Ok(());
        }

        let message = response
            .json::<ResendErrorResponse>()
            .await
            .map(|body| body.message)
            .unwrap_or_else(|_| format!("HTTP {status}"));

        Err(MailerError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn invite_escapes_organization_name() {
        let email = Email::team_invite("a@b.io", "http://app", "<Acme & Co>", "tok");
        assert!(email.html.contains("&lt;Acme &amp; Co&gt;"));
        assert!(email.html.contains("http://app/invite/tok"));
        assert_eq!(email.subject, "You've been invited to <Acme & Co>");
    }

    #[test]
    fn reset_links_carry_the_token() {
        let email = Email::password_reset("a@b.io", "http://app", "abc");
        assert!(email.html.contains("http://app/auth/reset-password?token=abc"));
        assert_eq!(email.subject, "Reset your password");
    }

    #[tokio::test]
    async fn sends_through_resend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer re_test"))
            .and(body_partial_json(json!({
                "from": "MetricFlow <noreply@metricflow.io>",
                "to": ["dev@example.com"],
                "subject": "Verify your email"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "em_1" })))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = ResendMailer::with_base_url(
            "re_test",
            "MetricFlow <noreply@metricflow.io>",
            server.uri(),
        )
        .unwrap();
        mailer
            .send(&Email::verification("dev@example.com", "http://app", "t"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn surfaces_provider_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({ "message": "invalid from" })),
            )
            .mount(&server)
            .await;

        let mailer = ResendMailer::with_base_url("re_test", "bad", server.uri()).unwrap();
        let err = mailer
            .send(&Email::verification("dev@example.com", "http://app", "t"))
            .await
            .unwrap_err();
        match err {
            MailerError::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "invalid from");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
