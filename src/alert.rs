/*! Run notifications.

When a webhook is configured, the start, end or failure of a run is posted to it as
`{"text": "..."}`. Delivery problems are logged and never fail the run.
!*/
use log::{error, info, warn};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::json;

use crate::config::AlertSettings;
use crate::error::Error;

pub struct Alerter {
    webhook: Option<(Client, String)>,
}

impl Alerter {
    pub fn new(settings: &AlertSettings) -> Self {
        Self {
            webhook: settings
                .webhook_url()
                .map(|url| (Client::new(), url.to_string())),
        }
    }

    /// An alerter that only logs.
    pub fn disabled() -> Self {
        Self { webhook: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook.is_some()
    }

    fn post(&self, message: &str) -> Result<(), Error> {
        if let Some((client, url)) = &self.webhook {
            let body = serde_json::to_string(&json!({ "text": message }))?;
            client
                .post(url.as_str())
                .header(CONTENT_TYPE, "application/json")
                .body(body)
                .send()?
                .error_for_status()?;
        }
        Ok(())
    }

    /// Send `message`, logging instead of failing if it can't be delivered.
    pub fn notify(&self, message: &str) {
        if let Err(e) = self.post(message) {
            warn!("could not deliver alert {:?}: {:?}", message, e);
        }
    }

    /// Run `f`, reporting its start and outcome.
    pub fn guard<T, F>(&self, name: &str, f: F) -> Result<T, Error>
    where
        F: FnOnce() -> Result<T, Error>,
    {
        self.notify(&started(name));
        match f() {
            Ok(res) => {
                info!("{} finished", name);
                self.notify(&finished(name));
                Ok(res)
            }
            Err(e) => {
                error!("{} failed: {:?}", name, e);
                self.notify(&failed(name, &e));
                Err(e)
            }
        }
    }
}

fn started(name: &str) -> String {
    format!("Started `{}`", name)
}

fn finished(name: &str) -> String {
    format!("Finished `{}` successfully", name)
}

fn failed(name: &str, e: &Error) -> String {
    format!("`{}` failed with error:\n```{:?}```", name, e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_webhook_disables_alerts() {
        let settings = AlertSettings {
            webhook_url: Some("  ".to_string()),
        };
        assert!(!Alerter::new(&settings).is_enabled());
        assert!(!Alerter::new(&AlertSettings::default()).is_enabled());
    }

    #[test]
    fn guard_passes_results_through() {
        let alerter = Alerter::disabled();
        assert_eq!(alerter.guard("nlp", || Ok(3)).unwrap(), 3);

        let res: Result<(), Error> =
            alerter.guard("nlp", || Err(Error::Custom("boom".to_string())));
        assert!(matches!(res, Err(Error::Custom(m)) if m == "boom"));
    }

    #[test]
    fn unreachable_webhook_is_only_logged() {
        let settings = AlertSettings {
            webhook_url: Some("http://127.0.0.1:9/hook".to_string()),
        };
        let alerter = Alerter::new(&settings);
        assert!(alerter.is_enabled());
        assert_eq!(alerter.guard("lower-court", || Ok("done")).unwrap(), "done");
    }

    #[test]
    fn messages() {
        assert_eq!(started("nlp"), "Started `nlp`");
        assert!(failed("nlp", &Error::UnknownLang("rm".to_string())).contains("UnknownLang(\"rm\")"));
    }
}
