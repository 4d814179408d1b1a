use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use thiserror::Error;
use tracing::debug;

use clicker_proto::Command;

use crate::target::RokuTarget;

/// Why a key command never reached the set-top box. The display string is
/// sent verbatim to the controller inside an error frame.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("No Roku IP configured")]
    NoTarget,
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Transport(String),
}

impl ForwardError {
    fn metric_label(&self) -> &'static str {
        match self {
            ForwardError::NoTarget => "no_target",
            ForwardError::Timeout => "timeout",
            ForwardError::Transport(_) => "transport",
        }
    }
}

/// Delivers validated key commands to the device control endpoint.
#[derive(Clone)]
pub struct CommandForwarder {
    client: reqwest::Client,
    target: RokuTarget,
    ecp_port: u16,
    timeout: Duration,
}

impl CommandForwarder {
    pub fn new(
        target: RokuTarget,
        ecp_port: u16,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().no_proxy().build()?;
        Ok(Self {
            client,
            target,
            ecp_port,
            timeout,
        })
    }

    /// Send one command to the device. Any HTTP status counts as delivered;
    /// only missing targets, timeouts and transport failures are errors.
    pub async fn forward(&self, command: Command) -> Result<(), ForwardError> {
        let Some(ip) = self.target.get().await else {
            return Err(self.record_failure(ForwardError::NoTarget));
        };

        let url = format!(
            "http://{}:{}/{}/{}",
            ip,
            self.ecp_port,
            command.action.path_segment(),
            command.key.as_str()
        );

        let started = Instant::now();
        let result = self.client.post(&url).timeout(self.timeout).send().await;
        let elapsed = started.elapsed();
        histogram!("clicker_forward_duration_ms", elapsed.as_secs_f64() * 1000.0);

        match result {
            Ok(response) => {
                debug!(
                    %url,
                    status = %response.status(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "command forwarded"
                );
                counter!(
                    "clicker_commands_forwarded_total",
                    1,
                    "action" => command.action.path_segment()
                );
                Ok(())
            }
            Err(err) if err.is_timeout() => Err(self.record_failure(ForwardError::Timeout)),
            Err(err) => Err(self.record_failure(ForwardError::Transport(err.to_string()))),
        }
    }

    fn record_failure(&self, err: ForwardError) -> ForwardError {
        counter!(
            "clicker_commands_failed_total",
            1,
            "reason" => err.metric_label()
        );
        err
    }
}
