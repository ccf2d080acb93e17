//! Operator notifications.
//!
//! Delivery is best-effort: callers log a failed delivery and carry on.

use std::fmt::Display;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::error::NotifyError;
use crate::models::config::{NotifierConfig, NotifierKind};
use crate::models::report::ProcessingReport;

/// How urgently an operator should look at a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A short human-readable message for the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub severity: Severity,
}

impl Notification {
    /// Outcome of reconciling one invoice.
    pub fn summary(report: &ProcessingReport) -> Self {
        let severity = if report.error_count > 0 {
            Severity::Warning
        } else {
            Severity::Info
        };

        let mut body = format!(
            "Invoice {} of {} from {}\nFile: {}\n\nLines: {}\nMatched: {}\nUnmatched: {}\nErrors: {}",
            report.invoice_number,
            report.invoice_date,
            report.supplier_name,
            report.source_file,
            report.total_lines,
            report.matched_count,
            report.unmatched_count,
            report.error_count
        );
        if report.unmatched_count > 0 {
            body.push_str("\n\nUnmatched lines are waiting for manual review.");
        }

        Self {
            subject: format!(
                "Invoice {} from {}: {}/{} lines matched",
                report.invoice_number, report.supplier_name, report.matched_count, report.total_lines
            ),
            body,
            severity,
        }
    }

    /// A document that could not be read or parsed.
    pub fn failure(file: &str, error: &impl Display) -> Self {
        Self {
            subject: format!("Invoice document rejected: {}", file),
            body: format!(
                "The document {} was not reconciled.\n\nReason: {}",
                file, error
            ),
            severity: Severity::Error,
        }
    }

    /// An invoice that was already reconciled from another file.
    pub fn duplicate(supplier: &str, invoice_number: &str, file: &str) -> Self {
        Self {
            subject: format!("Invoice {} from {} already processed", invoice_number, supplier),
            body: format!(
                "The document {} repeats invoice {} from {}, which is already recorded.\n\
                 It was moved to the processed folder without touching stock.",
                file, invoice_number, supplier
            ),
            severity: Severity::Warning,
        }
    }
}

/// Delivers notifications to an operator channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        match notification.severity {
            Severity::Info => info!("{}\n{}", notification.subject, notification.body),
            Severity::Warning => warn!("{}\n{}", notification.subject, notification.body),
            Severity::Error => error!("{}\n{}", notification.subject, notification.body),
        }
        Ok(())
    }
}

/// Pipes notifications to an external program.
///
/// The subject is passed as the last argument and the body on stdin, so any
/// mail, SMS or chat client can be plugged in with a small wrapper script.
/// A program still running after the timeout is killed.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandNotifier {
    pub fn new(command: &[String]) -> Result<Self, NotifyError> {
        let (program, args) = command.split_first().ok_or(NotifyError::NotConfigured)?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout: NotifierConfig::default().timeout(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        debug!("Running notifier {} for '{}'", self.program, notification.subject);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(&notification.subject)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(NotifyError::Spawn)?;

        let body = notification.body.as_bytes();
        let finished = tokio::time::timeout(self.timeout, async {
            if let Some(mut stdin) = child.stdin.take() {
                match stdin.write_all(body).await {
                    Ok(()) => {}
                    // The program may exit without reading its input
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                    Err(e) => return Err(NotifyError::from(e)),
                }
            }
            Ok(child.wait().await?)
        })
        .await;

        let status = match finished {
            Ok(status) => status?,
            Err(_) => {
                warn!("Notifier {} still running after {:?}, killing it", self.program, self.timeout);
                child.start_kill()?;
                let _ = child.wait().await;
                return Err(NotifyError::Timeout(self.timeout));
            }
        };
        if !status.success() {
            return Err(NotifyError::Exit {
                code: status.code(),
            });
        }
        Ok(())
    }
}

/// Build the notifier described by `config`.
pub fn from_config(config: &NotifierConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    let notifier: Arc<dyn Notifier> = match config.kind {
        NotifierKind::Log => Arc::new(LogNotifier),
        NotifierKind::Command => {
            Arc::new(CommandNotifier::new(&config.command)?.with_timeout(config.timeout()))
        }
    };
    Ok(notifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use crate::error::ParseError;

    fn report() -> ProcessingReport {
        ProcessingReport {
            supplier_name: "Molino Rossi".to_string(),
            invoice_number: "FT/118".to_string(),
            invoice_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            source_file: "ft118.xml".to_string(),
            total_lines: 3,
            matched_count: 2,
            unmatched_count: 1,
            error_count: 0,
            outcomes: Vec::new(),
        }
    }

    #[test]
    fn test_summary() {
        let n = Notification::summary(&report());
        assert_eq!(n.subject, "Invoice FT/118 from Molino Rossi: 2/3 lines matched");
        assert_eq!(n.severity, Severity::Info);
        assert!(n.body.contains("Unmatched: 1"));
        assert!(n.body.contains("manual review"));
    }

    #[test]
    fn test_summary_with_errors_is_warning() {
        let mut report = report();
        report.error_count = 1;
        assert_eq!(Notification::summary(&report).severity, Severity::Warning);
    }

    #[test]
    fn test_failure() {
        let n = Notification::failure("broken.xml", &ParseError::MissingLines);
        assert_eq!(n.severity, Severity::Error);
        assert!(n.subject.contains("broken.xml"));
        assert!(n.body.contains("missing line item container"));
    }

    #[test]
    fn test_command_requires_program() {
        assert!(matches!(
            CommandNotifier::new(&[]),
            Err(NotifyError::NotConfigured)
        ));
        let config = NotifierConfig {
            kind: NotifierKind::Command,
            ..NotifierConfig::default()
        };
        assert!(from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_log_notifier() {
        let n = Notification::duplicate("Molino Rossi", "FT/118", "copy.xml");
        assert!(LogNotifier.deliver(&n).await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_receives_subject_and_body() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let command = vec![
            "sh".to_string(),
            "-c".to_string(),
            "cat > \"$0\"; printf '\\n%s' \"$1\" >> \"$0\"".to_string(),
            out.display().to_string(),
        ];

        let n = Notification::failure("broken.xml", &ParseError::MissingHeader);
        CommandNotifier::new(&command).unwrap().deliver(&n).await.unwrap();

        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.starts_with(&n.body));
        assert!(written.ends_with(&n.subject));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_exit_status() {
        let command = vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()];
        let n = Notification::summary(&report());

        let err = CommandNotifier::new(&command).unwrap().deliver(&n).await.unwrap_err();
        assert!(matches!(err, NotifyError::Exit { code: Some(3) }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_killed_after_timeout() {
        let command = vec!["sh".to_string(), "-c".to_string(), "sleep 30".to_string()];
        let notifier = CommandNotifier::new(&command)
            .unwrap()
            .with_timeout(Duration::from_millis(200));
        let n = Notification::summary(&report());

        let started = std::time::Instant::now();
        let err = notifier.deliver(&n).await.unwrap_err();

        assert!(matches!(err, NotifyError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_command_spawn_failure() {
        let command = vec!["/nonexistent/notifier-binary".to_string()];
        let n = Notification::summary(&report());

        let err = CommandNotifier::new(&command).unwrap().deliver(&n).await.unwrap_err();
        assert!(matches!(err, NotifyError::Spawn(_)));
    }
}
