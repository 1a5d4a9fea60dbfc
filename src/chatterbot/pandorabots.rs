//! Pandorabots client (talk-xml API).

use std::sync::LazyLock;

use async_trait::async_trait;
use quick_xml::escape::unescape;
use regex::Regex;
use tracing::debug;
use uuid::Uuid;

use crate::chatterbot::session::{ChatBotError, ChatSession};

pub const DEFAULT_URL: &str = "http://www.pandorabots.com/pandora/talk-xml";

static STATUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<result\b[^>]*\bstatus="(\d+)""#).unwrap());
static CUSTID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<result\b[^>]*\bcustid="([^"]*)""#).unwrap());
static THAT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<that>(.*?)</that>").unwrap());
static MESSAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<message>(.*?)</message>").unwrap());

/// A parsed talk-xml reply.
#[derive(Debug, PartialEq, Eq)]
struct TalkReply {
    text: String,
    cust_id: Option<String>,
}

pub struct PandorabotsSession {
    http: reqwest::Client,
    url: String,
    bot_id: String,
    /// Identifies this conversation to the bot; the server may hand back a new one.
    cust_id: String,
}

impl PandorabotsSession {
    pub fn new(http: reqwest::Client, url: &str, bot_id: &str) -> Self {
        Self {
            http,
            url: url.to_string(),
            bot_id: bot_id.to_string(),
            cust_id: Uuid::new_v4().simple().to_string(),
        }
    }
}

#[async_trait]
impl ChatSession for PandorabotsSession {
    async fn think(&mut self, utterance: &str) -> Result<String, ChatBotError> {
        let form = [
            ("botid", self.bot_id.as_str()),
            ("custid", self.cust_id.as_str()),
            ("input", utterance),
        ];

        let response = self.http.post(&self.url).form(&form).send().await?;

        let status = response.status();
        let body = response.text().await?;
        debug!("Pandorabots response status: {status}");

        if !status.is_success() {
            return Err(ChatBotError::Api { status, body });
        }

        let reply = parse_reply(&body)?;
        if let Some(cust_id) = reply.cust_id {
            self.cust_id = cust_id;
        }
        Ok(reply.text)
    }
}

fn parse_reply(xml: &str) -> Result<TalkReply, ChatBotError> {
    let status = STATUS_RE
        .captures(xml)
        .map(|c| c[1].to_string())
        .ok_or_else(|| ChatBotError::Malformed("missing result status".into()))?;

    if status != "0" {
        let message = MESSAGE_RE
            .captures(xml)
            .map(|c| xml_unescape(c[1].trim()))
            .transpose()?
            .unwrap_or_default();
        return Err(ChatBotError::Malformed(format!("status {status}: {message}")));
    }

    let text = THAT_RE
        .captures(xml)
        .map(|c| xml_unescape(c[1].trim()))
        .transpose()?
        .ok_or_else(|| ChatBotError::Malformed("missing <that> element".into()))?;

    let cust_id = CUSTID_RE
        .captures(xml)
        .map(|c| c[1].to_string())
        .filter(|id| !id.is_empty());

    Ok(TalkReply { text, cust_id })
}

/// Decode entity and character references in element text.
fn xml_unescape(s: &str) -> Result<String, ChatBotError> {
    unescape(s)
        .map(|text| text.into_owned())
        .map_err(|e| ChatBotError::Malformed(format!("bad escape in reply: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const OK_REPLY: &str = r#"<result status="0" botid="abc" custid="c0ffee"><input>hi</input><that>Hello there &amp; welcome.</that></result>"#;

    #[test]
    fn test_parse_reply() {
        let reply = parse_reply(OK_REPLY).unwrap();
        assert_eq!(reply.text, "Hello there & welcome.");
        assert_eq!(reply.cust_id.as_deref(), Some("c0ffee"));
    }

    #[test]
    fn test_parse_reply_decodes_character_references() {
        let xml = r#"<result status="0" botid="abc"><that>Caf&#233; &#x263A; it&#39;s &lt;b&gt;</that></result>"#;
        let reply = parse_reply(xml).unwrap();
        assert_eq!(reply.text, "Café ☺ it's <b>");
    }

    #[test]
    fn test_parse_reply_error_message_decoded() {
        let xml = r#"<result status="4" botid="x"><message>No bot &#8220;x&#8221;</message></result>"#;
        let err = parse_reply(xml).unwrap_err();
        assert!(err.to_string().contains("No bot \u{201c}x\u{201d}"));
    }

    #[test]
    fn test_parse_reply_unknown_entity() {
        let xml = r#"<result status="0" botid="abc"><that>a &bogus; b</that></result>"#;
        assert!(matches!(parse_reply(xml), Err(ChatBotError::Malformed(_))));
    }

    #[test]
    fn test_parse_reply_trims_whitespace() {
        let xml = "<result status=\"0\" botid=\"abc\">\n<that>\n  Hi.  \n</that></result>";
        let reply = parse_reply(xml).unwrap();
        assert_eq!(reply.text, "Hi.");
        assert_eq!(reply.cust_id, None);
    }

    #[test]
    fn test_parse_reply_error_status() {
        let xml = r#"<result status="4" botid="nope"><message>Bot not found</message></result>"#;
        let err = parse_reply(xml).unwrap_err();
        assert!(err.to_string().contains("Bot not found"));
    }

    #[test]
    fn test_parse_reply_missing_that() {
        let xml = r#"<result status="0" botid="abc"></result>"#;
        assert!(matches!(parse_reply(xml), Err(ChatBotError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_think_posts_form_and_keeps_custid() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("POST", "/pandora/talk-xml")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("botid".into(), "abc".into()),
                Matcher::UrlEncoded("input".into(), "hi there".into()),
            ]))
            .with_body(OK_REPLY)
            .create_async()
            .await;

        let url = format!("{}/pandora/talk-xml", server.url());
        let mut session = PandorabotsSession::new(reqwest::Client::new(), &url, "abc");
        let reply = session.think("hi there").await.unwrap();

        assert_eq!(reply, "Hello there & welcome.");
        assert_eq!(session.cust_id, "c0ffee");
        first.assert_async().await;

        let second = server
            .mock("POST", "/pandora/talk-xml")
            .match_body(Matcher::UrlEncoded("custid".into(), "c0ffee".into()))
            .with_body(OK_REPLY)
            .create_async()
            .await;
        session.think("again").await.unwrap();
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_think_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/pandora/talk-xml")
            .with_status(503)
            .with_body("down")
            .create_async()
            .await;

        let url = format!("{}/pandora/talk-xml", server.url());
        let mut session = PandorabotsSession::new(reqwest::Client::new(), &url, "abc");
        let err = session.think("hi").await.unwrap_err();
        assert!(matches!(err, ChatBotError::Api { status, .. } if status.as_u16() == 503));
    }
}
