//! Completion action
//!
//! Invoked once with the finished record; returns the confirmation shown to
//! the user. The default action renders an order receipt.

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;

use crate::config::{ReceiptConfig, ReceiptFormat};
use crate::record::{Record, RecordSchema};

/// Number of illustrative images available under `image_base_url`
const RECEIPT_IMAGES: u32 = 7;

#[async_trait]
pub trait CompletionAction: Send + Sync {
    async fn finalize(&self, record: &Record) -> Result<String>;
}

/// Receipt listing every field by label
pub struct OrderReceipt {
    config: ReceiptConfig,
    schema: RecordSchema,
}

impl OrderReceipt {
    pub fn new(config: ReceiptConfig, schema: RecordSchema) -> Self {
        Self { config, schema }
    }

    fn rows<'a>(&'a self, record: &'a Record) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.schema
            .fields()
            .iter()
            .filter_map(move |f| record.get(&f.name).map(|v| (f.label.as_str(), v)))
    }

    pub fn render_text(&self, record: &Record) -> String {
        let mut out = self.config.title.clone();
        for (label, value) in self.rows(record) {
            out.push_str(&format!("\n{}: {}", capitalize(label), value));
        }
        out.push_str(&format!("\n\n{}", self.config.footer));
        out
    }

    pub fn render_html(&self, record: &Record) -> String {
        let mut out = format!("<h3>{}</h3>\n<table>\n", escape_html(&self.config.title));
        for (label, value) in self.rows(record) {
            out.push_str(&format!(
                "<tr><td><b>{}</b></td><td>{}</td></tr>\n",
                escape_html(&capitalize(label)),
                escape_html(value)
            ));
        }
        out.push_str("</table>\n");
        if let Some(base) = self.config.image_base_url.as_deref() {
            let n = rand::thread_rng().gen_range(0..RECEIPT_IMAGES);
            out.push_str(&format!(
                "<img style='width:100%' src='{}/pizza{}.jpg'>\n",
                base.trim_end_matches('/'),
                n
            ));
        }
        out.push_str(&format!("<p>{}</p>", escape_html(&self.config.footer)));
        out
    }
}

#[async_trait]
impl CompletionAction for OrderReceipt {
    async fn finalize(&self, record: &Record) -> Result<String> {
        tracing::info!(record = ?record, "Order completed");
        Ok(match self.config.format {
            ReceiptFormat::Text => self.render_text(record),
            ReceiptFormat::Html => self.render_html(record),
        })
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormConfig;

    fn completed(config: &FormConfig) -> Record {
        let schema = config.schema().unwrap();
        Record::with_values(
            &schema,
            [
                ("pizza_type", "Margherita"),
                ("address", "Via Roma 1"),
                ("phone", "333123123"),
            ],
        )
    }

    #[tokio::test]
    async fn test_html_receipt() {
        let config = FormConfig::pizza_default().unwrap();
        let receipt = OrderReceipt::new(config.receipt.clone(), config.schema().unwrap());
        let html = receipt.finalize(&completed(&config)).await.unwrap();

        assert!(html.starts_with("<h3>PIZZA CHALLENGE - ORDER COMPLETED</h3>"));
        assert!(html.contains("<td>Margherita</td>"));
        assert!(html.contains("<td>Via Roma 1</td>"));
        assert!(html.contains("<td>333123123</td>"));
        assert!(html.contains("https://maxdam.github.io/cat-pizza-challenge/img/order/pizza"));
        assert!(html.ends_with("<p>Thanks for your order.. your pizza is on its way!</p>"));

        let n: u32 = html
            .split("/pizza")
            .nth(1)
            .and_then(|rest| rest.split(".jpg").next())
            .unwrap()
            .parse()
            .unwrap();
        assert!(n < RECEIPT_IMAGES);
    }

    #[tokio::test]
    async fn test_text_receipt_and_escaping() {
        let config = FormConfig::pizza_default().unwrap();
        let receipt = OrderReceipt::new(ReceiptConfig::default(), config.schema().unwrap());
        let text = receipt.finalize(&completed(&config)).await.unwrap();
        assert!(text.starts_with("ORDER COMPLETED\n"));
        assert!(text.contains("Via Roma 1"));
        assert!(text.ends_with("Thanks for your order!"));

        assert_eq!(escape_html("<b>Tom & Jerry's</b>"), "&lt;b&gt;Tom &amp; Jerry&#39;s&lt;/b&gt;");
    }
}
