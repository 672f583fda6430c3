use async_trait::async_trait;
use futures::future::join_all;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::{error, info, warn};

use crate::configuration::config::MailConfig;
use crate::engine::Notify;
use crate::error::NotificationFailure;
use crate::models::charger_models::ChargerEvent;

// --------------------------------------------------------------------------------------------------------------

/// Subject and body of one notification, reading already substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body:    String,
}

/// Fixed subject/body per event.
fn template(event: ChargerEvent, threshold_kw: f64) -> (&'static str, String) {
    match event {
        ChargerEvent::On => (
            "EV Charger Switch Turned On",
            "Turned the EV charger switch on as the solar panels are generating more than the house usage plus the EV charger usage.".to_string(),
        ),
        ChargerEvent::OffCurrent => (
            "EV Charger Switch Turned Off",
            format!("Turned the EV charger switch off as the combined current usage plus the EV charger usage is more than {} kW.", threshold_kw),
        ),
        ChargerEvent::OffValue => (
            "EV Charger Switch Turned Off",
            "Turned the EV charger switch off as it is not in the lowest cost tier's time period.".to_string(),
        ),
        ChargerEvent::OffStartup => (
            "EV Charger Starting",
            "Turned the gateway switch on and the EV charger switch off at startup. Waiting for the gateway to boot before the first meter reading.".to_string(),
        ),
        ChargerEvent::OnError => (
            "EV Charger Error Turning On",
            "Could not turn the EV charger switch on.".to_string(),
        ),
        ChargerEvent::OffError => (
            "EV Charger Error Turning Off",
            "Could not turn the EV charger switch off.".to_string(),
        ),
        ChargerEvent::OnValueWindow => (
            "EV Charger Turned On",
            "Turned the EV charger switch on as it is now in the lowest cost tier's time period.".to_string(),
        ),
        ChargerEvent::OnValueWindowError => (
            "EV Charger Error Turning On",
            "Could not turn the EV charger switch on during the lowest cost tier's time period.".to_string(),
        ),
        ChargerEvent::RebootGatewayTimeout => (
            "EV Charger Rebooted Gateway - Request Timeout",
            "Rebooted the gateway since a Request Timeout response was received.".to_string(),
        ),
        ChargerEvent::RebootGatewayUnavailable => (
            "EV Charger Rebooted Gateway - Service Unavailable",
            "Rebooted the gateway since a Service Unavailable response was received.".to_string(),
        ),
    }
}

pub fn render(event: ChargerEvent, demand_kw: f64, threshold_kw: f64) -> RenderedMessage {
    let (subject, mut body) = template(event, threshold_kw);
    if event.includes_reading() {
        body.push_str(&format!(" Meter reading: {:.3} kW.", demand_kw));
    }
    RenderedMessage {
        subject: subject.to_string(),
        body,
    }
}

// --------------------------------------------------------------------------------------------------------------

struct SmtpDispatch {
    transport:  AsyncSmtpTransport<Tokio1Executor>,
    from:       Mailbox,
    recipients: Vec<Mailbox>,
}

/// Sends event notifications by mail (or to SMS gateways). With mail disabled it only logs.
pub struct Mailer {
    dispatch:     Option<SmtpDispatch>,
    threshold_kw: f64,
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotificationFailure> {
    address
        .parse()
        .map_err(|_| NotificationFailure::Address(address.to_string()))
}

impl Mailer {
    pub fn new(config: &MailConfig, threshold_kw: f64) -> Result<Self, NotificationFailure> {
        if !config.enabled {
            info!("[Mail] Notifications disabled; events are logged only.");
            return Ok(Self { dispatch: None, threshold_kw });
        }

        let from = parse_mailbox(&config.from)?;
        let recipients = config
            .recipients
            .iter()
            .map(|r| parse_mailbox(r))
            .collect::<Result<Vec<_>, _>>()?;

        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| NotificationFailure::Transport(e.to_string()))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        Ok(Self {
            dispatch: Some(SmtpDispatch { transport, from, recipients }),
            threshold_kw,
        })
    }

    async fn send_to_all(&self, message: &RenderedMessage) -> Result<(), NotificationFailure> {
        let Some(dispatch) = &self.dispatch else {
            return Ok(());
        };

        let mut last_failure = None;
        let mut sends = Vec::with_capacity(dispatch.recipients.len());
        for to in &dispatch.recipients {
            let email = match Message::builder()
                .from(dispatch.from.clone())
                .to(to.clone())
                .subject(message.subject.as_str())
                .body(message.body.clone())
            {
                Ok(email) => email,
                Err(e) => {
                    error!("[Mail] Failed to build '{}' for {}: {}", message.subject, to, e);
                    last_failure = Some(NotificationFailure::Build(e.to_string()));
                    continue;
                }
            };
            sends.push(async move { (to, dispatch.transport.send(email).await) });
        }

        for (to, result) in join_all(sends).await {
            match result {
                Ok(_) => info!("[Mail] Sent '{}' to {}", message.subject, to),
                Err(e) => {
                    error!("[Mail] Failed to send '{}' to {}: {}", message.subject, to, e);
                    last_failure = Some(NotificationFailure::Transport(e.to_string()));
                }
            }
        }

        match last_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Notify for Mailer {
    async fn notify(&self, event: ChargerEvent, demand_kw: f64) {
        let message = render(event, demand_kw, self.threshold_kw);
        info!("[Mail] {:?}: {}", event, message.body);
        if let Err(e) = self.send_to_all(&message).await {
            warn!("[Mail] Notification {:?} not delivered: {}", event, e);
        }
    }
}

// --------------------------------------------------------------------------------------------------------------
