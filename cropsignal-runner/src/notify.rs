//! Alert hand-off.
//!
//! Transports (mail, chat) live outside this crate. A [`Notifier`] receives a
//! rendered [`Alert`]; the bundled [`LogNotifier`] only records it.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::info;

use cropsignal_core::domain::{Action, Signal};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("empty alert target")]
    EmptyTarget,

    #[error("invalid email address: {0}")]
    BadEmail(String),
}

/// Where an alert goes. Anything containing `@` is an email address,
/// everything else a chat id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertTarget {
    Email(String),
    Chat(String),
}

impl FromStr for AlertTarget {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(NotifyError::EmptyTarget);
        }
        match s.split_once('@') {
            Some((user, domain)) => {
                if user.is_empty() || domain.is_empty() || domain.contains('@') {
                    Err(NotifyError::BadEmail(s.to_string()))
                } else {
                    Ok(AlertTarget::Email(s.to_string()))
                }
            }
            None => Ok(AlertTarget::Chat(s.to_string())),
        }
    }
}

impl fmt::Display for AlertTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertTarget::Email(addr) => write!(f, "email:{addr}"),
            AlertTarget::Chat(id) => write!(f, "chat:{id}"),
        }
    }
}

/// A rendered alert for one signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub subject: String,
    pub body: String,
}

impl Alert {
    pub fn for_signal(display_name: &str, variant: &str, s: &Signal) -> Self {
        let subject = format!(
            "{} {} signal ({}) {}",
            display_name, s.action, variant, s.date
        );

        let mut body = format!(
            "{display_name} [{variant}] {}\n\
             Action: {}  Confidence: {:.1}%\n\
             Entry: {:.2}\n",
            s.date,
            s.action,
            s.confidence * 100.0,
            s.entry_price,
        );
        if let (Some(stop), Some(target)) = (s.stop_loss, s.profit_target) {
            body.push_str(&format!("Stop: {stop:.2}  Target: {target:.2}\n"));
        }
        if s.action != Action::Hold {
            body.push_str(&format!(
                "Size: {:.1}% of equity (tier {:.2})\n",
                s.position_size_pct, s.tier_fraction
            ));
        }
        if let Some(exit) = s.time_stop_date {
            body.push_str(&format!("Time stop: {exit}\n"));
        }
        Self { subject, body }
    }
}

/// Delivers alerts. Implementations must be usable from any thread.
pub trait Notifier: Send + Sync {
    fn send(&self, target: &AlertTarget, alert: &Alert) -> Result<(), NotifyError>;
}

/// Records alerts through `tracing` instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, target: &AlertTarget, alert: &Alert) -> Result<(), NotifyError> {
        info!(recipient = %target, subject = %alert.subject, "alert handed off");
        Ok(())
    }
}

/// Alerts go out for trades only; HOLD is not news.
pub fn should_alert(signal: &Signal) -> bool {
    signal.is_trade()
}
