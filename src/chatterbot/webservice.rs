//! Cleverbot / Jabberwacky client (the `webservicemin` form protocol).
//!
//! Both services speak the same protocol and differ only in URL and in how
//! much of the encoded form goes into the `icognocheck` digest. Each reply
//! is a `\r`-separated record; most fields are echoed back as form variables
//! on the next request, which is how the conversation state is carried.

use async_trait::async_trait;
use md5::{Digest, Md5};
use tracing::debug;

use crate::chatterbot::session::{ChatBotError, ChatSession};

pub const CLEVERBOT_URL: &str = "http://www.cleverbot.com/webservicemin";
pub const JABBERWACKY_URL: &str = "http://jabberwacky.com/webservicemin";

/// End (exclusive) of the digested slice of the encoded form.
pub const CLEVERBOT_END_INDEX: usize = 35;
pub const JABBERWACKY_END_INDEX: usize = 29;

/// Start of the digested slice, right after `stimulus=`.
const DIGEST_START: usize = 9;

/// Record field holding the reply text.
const REPLY_FIELD: usize = 16;

/// Record fields fed back into the form, by position.
const SESSION_FIELDS: [(usize, &str); 22] = [
    (1, "sessionid"),
    (2, "logurl"),
    (3, "vText8"),
    (4, "vText7"),
    (5, "vText6"),
    (6, "vText5"),
    (7, "vText4"),
    (8, "vText3"),
    (9, "vText2"),
    (10, "prevref"),
    (12, "emotionalhistory"),
    (13, "ttsLocMP3"),
    (14, "ttsLocTXT"),
    (15, "ttsLocTXT3"),
    (16, "ttsText"),
    (17, "lineRef"),
    (18, "lineURL"),
    (19, "linePOST"),
    (20, "lineChoices"),
    (21, "lineChoicesAbbrev"),
    (22, "typingData"),
    (23, "divert"),
];

pub struct WebServiceSession {
    http: reqwest::Client,
    url: String,
    end_index: usize,
    /// Form variables in the order they are sent. Order matters for the digest.
    vars: Vec<(&'static str, String)>,
}

impl WebServiceSession {
    pub fn new(http: reqwest::Client, url: &str, end_index: usize) -> Self {
        Self {
            http,
            url: url.to_string(),
            end_index,
            vars: vec![
                ("stimulus", String::new()),
                ("islearning", "1".to_string()),
                ("icognoid", "wsf".to_string()),
            ],
        }
    }

    fn set_var(&mut self, key: &'static str, value: String) {
        match self.vars.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.vars.push((key, value)),
        }
    }

    /// Encode the form and append its check digest.
    fn encode_form(&self) -> String {
        let data = self
            .vars
            .iter()
            .map(|(k, v)| format!("{}={}", k, form_encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let end = self.end_index.min(data.len());
        let start = DIGEST_START.min(end);
        let digest = Md5::digest(&data.as_bytes()[start..end]);

        format!("{data}&icognocheck={digest:x}")
    }

    /// Absorb a reply record and return the reply text.
    fn absorb(&mut self, record: &str) -> Result<String, ChatBotError> {
        let fields: Vec<&str> = record.split('\r').collect();
        let reply = fields
            .get(REPLY_FIELD)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| {
                ChatBotError::Malformed(format!("expected at least {} fields, got {}", REPLY_FIELD + 1, fields.len()))
            })?;

        for (index, key) in SESSION_FIELDS {
            let value = fields.get(index).copied().unwrap_or_default();
            self.set_var(key, value.to_string());
        }

        Ok(reply)
    }
}

/// `application/x-www-form-urlencoded` value encoding (spaces as `+`).
fn form_encode(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}

#[async_trait]
impl ChatSession for WebServiceSession {
    async fn think(&mut self, utterance: &str) -> Result<String, ChatBotError> {
        self.set_var("stimulus", utterance.to_string());
        let body = self.encode_form();

        let response = self
            .http
            .post(&self.url)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        debug!("{} response status: {status}", self.url);

        if !status.is_success() {
            return Err(ChatBotError::Api { status, body: text });
        }

        self.absorb(&text)
    }
}
