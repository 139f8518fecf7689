use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use thiserror::Error;

use crate::{
    config::MailConfig,
    models::{Order, OrderItem},
};

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// Outbound notification collaborator. Without mail credentials it degrades
/// to a tracing no-op so OTP codes still show up in the logs during
/// development.
#[derive(Clone)]
pub struct Mailer {
    inner: Option<SmtpInner>,
}

#[derive(Clone)]
struct SmtpInner {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn from_config(config: Option<&MailConfig>) -> anyhow::Result<Self> {
        let Some(config) = config else {
            tracing::info!("mail not configured, email dispatch degrades to log output");
            return Ok(Self { inner: None });
        };

        let credentials =
            Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid MAIL_FROM address: {}", config.from))?;

        Ok(Self {
            inner: Some(SmtpInner { transport, from }),
        })
    }

    pub fn noop() -> Self {
        Self { inner: None }
    }

    pub async fn send_welcome(&self, to: &str, name: &str) -> Result<(), MailerError> {
        self.send(to, "Welcome to ZeroShift 🖤", &welcome_html(name), None)
            .await
    }

    pub async fn send_login_code(
        &self,
        to: &str,
        name: &str,
        code: &str,
    ) -> Result<(), MailerError> {
        self.send(
            to,
            "Your ZeroShift Login Code",
            &code_html(name, code, "Login Verification", "login code"),
            Some(code),
        )
        .await
    }

    pub async fn send_reset_code(
        &self,
        to: &str,
        name: &str,
        code: &str,
    ) -> Result<(), MailerError> {
        self.send(
            to,
            "Reset your ZeroShift Password",
            &code_html(name, code, "Password Reset", "password reset code"),
            Some(code),
        )
        .await
    }

    pub async fn send_order_confirmation(
        &self,
        to: &str,
        order: &Order,
        items: &[OrderItem],
    ) -> Result<(), MailerError> {
        let short_id = order.id.simple().to_string()[..8].to_uppercase();
        self.send(
            to,
            &format!("Your ZeroShift Order {short_id} is Confirmed!"),
            &order_confirmation_html(&short_id, order, items),
            None,
        )
        .await
    }

    async fn send(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        code: Option<&str>,
    ) -> Result<(), MailerError> {
        let Some(inner) = &self.inner else {
            match code {
                Some(code) => tracing::info!(%to, %subject, %code, "mail not configured, would send"),
                None => tracing::info!(%to, %subject, "mail not configured, would send"),
            }
            return Ok(());
        };

        let message = Message::builder()
            .from(inner.from.clone())
            .to(to
                .parse()
                .map_err(|_| MailerError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())?;

        inner.transport.send(message).await?;
        tracing::info!(%to, %subject, "email sent");
        Ok(())
    }
}

/// Spawn an email send so the request never waits on it; failures are
/// logged and swallowed.
pub fn dispatch<F>(fut: F)
where
    F: std::future::Future<Output = Result<(), MailerError>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = fut.await {
            tracing::warn!(error = %err, "email dispatch failed");
        }
    });
}

fn header_html(tagline: &str) -> String {
    format!(
        r#"<h1 style="font-size:22px;font-weight:900;letter-spacing:-1px;margin-bottom:4px;">ZERO<span style="color:#111">SHIFT</span></h1>
<p style="color:#666;margin-top:0;font-size:13px;">{tagline}</p>
<hr style="border:none;border-top:1px solid #e5e5e5;margin:20px 0;">"#
    )
}

fn code_html(name: &str, code: &str, tagline: &str, purpose: &str) -> String {
    format!(
        r#"<div style="font-family:sans-serif;max-width:480px;margin:auto;padding:32px;background:#f9f9f9;">
{header}
<p style="font-size:15px;">Hey <strong>{name}</strong>, here is your {purpose}:</p>
<div style="background:#111;color:#fff;font-size:36px;font-weight:900;letter-spacing:12px;padding:24px;text-align:center;border-radius:4px;margin:20px 0;">{code}</div>
<p style="color:#888;font-size:12px;">This code expires in <strong>10 minutes</strong>. Do not share it with anyone.</p>
<p style="color:#888;font-size:12px;">If you didn't request this, you can safely ignore this email.</p>
</div>"#,
        header = header_html(tagline),
    )
}

fn welcome_html(name: &str) -> String {
    format!(
        r#"<div style="font-family:sans-serif;max-width:560px;margin:auto;padding:32px;background:#f9f9f9;">
{header}
<h2>Welcome, {name}!</h2>
<p>Your account has been created. Start exploring our premium collections.</p>
</div>"#,
        header = header_html("Welcome"),
    )
}

fn order_confirmation_html(short_id: &str, order: &Order, items: &[OrderItem]) -> String {
    let rows: String = items
        .iter()
        .map(|item| {
            format!(
                r#"<tr style="border-bottom:1px solid #e5e5e5;"><td style="padding:10px 12px;">{name}{size}</td><td align="right" style="padding:10px 12px;">{qty}</td><td align="right" style="padding:10px 12px;">{line}</td></tr>"#,
                name = item.name,
                size = if item.size.is_empty() {
                    String::new()
                } else {
                    format!(r#" <span style="color:#888;">({})</span>"#, item.size)
                },
                qty = item.qty,
                line = money(item.price * i64::from(item.qty)),
            )
        })
        .collect();

    format!(
        r#"<div style="font-family:sans-serif;max-width:560px;margin:auto;padding:32px;background:#f9f9f9;">
{header}
<h2 style="font-size:18px;font-weight:700;">Thanks for your order!</h2>
<p>We received your order <strong>#{short_id}</strong> and it's currently being processed.</p>
<table style="width:100%;border-collapse:collapse;margin-top:16px;">
<thead><tr style="background:#111;color:#fff;"><th align="left" style="padding:10px 12px;">Item</th><th align="right" style="padding:10px 12px;">Qty</th><th align="right" style="padding:10px 12px;">Price</th></tr></thead>
<tbody>{rows}</tbody>
</table>
<div style="margin-top:20px;text-align:right;"><strong>Total: {total}</strong></div>
</div>"#,
        header = header_html("Order Confirmation"),
        total = money(order.total_amount),
    )
}

// Amounts are stored in minor units; this is display formatting only.
fn money(minor: i64) -> String {
    format!("₹{}.{:02}", minor / 100, (minor % 100).abs())
}
