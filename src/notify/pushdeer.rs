use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{Notification, Notifier};

/// PushDeer push channel (`/message/push?pushkey=..&text=..`).
pub struct PushDeerNotifier {
    endpoint: String,
    key: String,
    client: Client,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct PushDeerResponse {
    code: i64,
    #[serde(default)]
    error: Option<String>,
}

impl PushDeerNotifier {
    pub fn new(endpoint: String, key: String) -> Self {
        Self {
            endpoint,
            key,
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for PushDeerNotifier {
    fn name(&self) -> &'static str {
        "pushdeer"
    }

    async fn send(&self, n: &Notification) -> Result<()> {
        let text = n.text();
        let rsp: PushDeerResponse = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .form(&[("pushkey", self.key.as_str()), ("text", text.as_str()), ("type", "text")])
            .send()
            .await
            .context("pushdeer post")?
            .error_for_status()
            .context("pushdeer non-2xx")?
            .json()
            .await
            .context("pushdeer response json")?;

        if rsp.code != 0 {
            return Err(anyhow!(
                "pushdeer rejected message (code {}): {}",
                rsp.code,
                rsp.error.unwrap_or_default()
            ));
        }
        Ok(())
    }
}
