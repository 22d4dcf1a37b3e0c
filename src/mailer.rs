//! Mail dispatch: the transport seam and the `"send email"` job handler.
//!
//! Dispatch is a capability trait ([`MailTransport`]) so the scheduler never
//! knows which provider is behind it. The production implementation
//! ([`HttpMailer`]) posts JSON to a provider endpoint; [`MemoryMailer`]
//! records outbound mail for tests. Sending is a single synchronous attempt —
//! no retry, no rate limiting, no bounce handling.

use std::sync::Arc;

use async_trait::async_trait;
use miette::Diagnostic;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::scheduler::{HandlerError, JobHandler, JobRecord};

/// Job kind under which send jobs are recorded at the scheduler boundary.
pub const SEND_EMAIL_KIND: &str = "send email";

/// Payload of a `"send email"` job.
///
/// Two shapes coexist: ad hoc scheduling fills `to`/`subject`/`text`, while
/// sequence-derived jobs fill `sequenceId`/`nodeId`/`subject`/`body`. Every
/// field is optional and the handler reads whichever are present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// One outbound email, ready for a transport.
#[derive(Clone, Debug, PartialEq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Errors surfaced by mail transports.
#[derive(Debug, Error, Diagnostic)]
pub enum DispatchError {
    /// The payload named no recipient.
    #[error("no recipient on outbound email")]
    #[diagnostic(
        code(coldflow::mailer::missing_recipient),
        help("Ad hoc jobs carry `to`; sequence-derived jobs currently do not.")
    )]
    MissingRecipient,

    /// The provider could not be reached.
    #[error("mail transport error: {0}")]
    #[diagnostic(code(coldflow::mailer::transport))]
    Transport(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("mail provider rejected the send ({status}): {body}")]
    #[diagnostic(code(coldflow::mailer::rejected))]
    Rejected { status: u16, body: String },
}

/// Capability interface for sending one email.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Send exactly one email. Single attempt; failures propagate.
    async fn send(&self, email: &OutboundEmail) -> Result<(), DispatchError>;
}

/// Provider-backed transport posting `{from, to, subject, text}` as JSON.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    from: String,
}

impl HttpMailer {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token: None,
            from: from.into(),
        }
    }

    /// Bearer token for the provider API.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[async_trait]
impl MailTransport for HttpMailer {
    #[instrument(skip(self, email), fields(to = %email.to))]
    async fn send(&self, email: &OutboundEmail) -> Result<(), DispatchError> {
        let mut request = self.client.post(&self.endpoint).json(&json!({
            "from": self.from,
            "to": email.to,
            "subject": email.subject,
            "text": email.body,
        }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Transport that records outbound mail instead of sending it.
///
/// Intended for tests and local development; `fail_with` turns every send
/// into an error so redelivery paths can be exercised.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutboundEmail>>,
    failure: Mutex<Option<String>>,
}

impl MemoryMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    /// Everything sent so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl MailTransport for MemoryMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), DispatchError> {
        if let Some(message) = self.failure.lock().clone() {
            return Err(DispatchError::Rejected {
                status: 550,
                body: message,
            });
        }
        self.sent.lock().push(email.clone());
        Ok(())
    }
}

/// Handler for [`SEND_EMAIL_KIND`] jobs.
///
/// Decodes the payload, resolves the recipient and content from whichever
/// shape is present, and dispatches through the configured transport.
/// Failures are logged and propagated so the scheduler records them.
pub struct SendEmailHandler {
    mailer: Arc<dyn MailTransport>,
}

impl SendEmailHandler {
    #[must_use]
    pub fn new(mailer: Arc<dyn MailTransport>) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl JobHandler for SendEmailHandler {
    async fn run(&self, job: &JobRecord) -> Result<(), HandlerError> {
        let payload: SendPayload =
            serde_json::from_value(job.payload.clone()).map_err(HandlerError::new)?;

        let to = payload.to.ok_or_else(|| {
            let err = DispatchError::MissingRecipient;
            error!(job_id = %job.id, node_id = ?payload.node_id, "cannot dispatch email: {err}");
            HandlerError::new(err)
        })?;
        let email = OutboundEmail {
            to,
            subject: payload.subject.unwrap_or_default(),
            // Sequence-derived jobs carry `body`, ad hoc jobs carry `text`.
            body: payload.body.or(payload.text).unwrap_or_default(),
        };

        match self.mailer.send(&email).await {
            Ok(()) => {
                info!(job_id = %job.id, to = %email.to, "email sent");
                Ok(())
            }
            Err(err) => {
                error!(job_id = %job.id, to = %email.to, error = %err, "email dispatch failed");
                Err(HandlerError::new(err))
            }
        }
    }
}
