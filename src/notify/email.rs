use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::Notifier;
use crate::config::MailConfig;

pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    subject_tag: String,
}

impl EmailNotifier {
    pub fn from_config(cfg: &MailConfig, subject_tag: &str) -> Result<Self> {
        let from_addr = cfg.from.as_deref().unwrap_or(&cfg.username);
        let from: Mailbox = from_addr
            .parse()
            .with_context(|| format!("invalid sender address {from_addr}"))?;
        let to: Mailbox = cfg
            .recipient
            .parse()
            .with_context(|| format!("invalid recipient address {}", cfg.recipient))?;

        let creds = Credentials::new(cfg.username.clone(), cfg.password.clone());
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .with_context(|| format!("invalid SMTP host {}", cfg.host))?
            .credentials(creds);
        if let Some(port) = cfg.port {
            builder = builder.port(port);
        }
        let mailer = builder.build();

        Ok(Self {
            mailer,
            from,
            to,
            subject_tag: subject_tag.trim().to_string(),
        })
    }
}

fn tagged_subject(tag: &str, subject: &str) -> String {
    if tag.is_empty() {
        subject.to_string()
    } else {
        format!("{tag} {subject}")
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        let msg = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(tagged_subject(&self.subject_tag, subject))
            .header(header::ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}
