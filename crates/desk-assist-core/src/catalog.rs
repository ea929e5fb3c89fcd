use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::host::{HostSdk, Notifier, TemplateRequest};
use crate::response::parse_response;

/// The product areas a query can be restricted to.
#[derive(Clone)]
pub struct ProductCatalog {
    host: Arc<dyn HostSdk>,
    notifier: Notifier,
    template: String,
}

impl ProductCatalog {
    pub fn new(host: Arc<dyn HostSdk>, template: impl Into<String>) -> Self {
        Self {
            notifier: Notifier::new(host.clone()),
            host,
            template: template.into(),
        }
    }

    /// Fetch the product list. An empty response means no products.
    pub async fn load(&self) -> Result<Vec<String>> {
        let response = self
            .host
            .invoke_template(&self.template, TemplateRequest::empty())
            .await?;
        let products = match parse_response(&response) {
            None => Vec::new(),
            Some(value) => decode_products(value)?,
        };
        debug!(count = products.len(), "Loaded product areas");
        Ok(products)
    }

    /// Pick the product area recorded on the open ticket, if it is one of
    /// `available`.
    pub async fn auto_select(&self, available: &[String]) -> Option<String> {
        let ticket = match self.host.ticket().await {
            Ok(ticket) => ticket,
            Err(err) => {
                warn!(error = %err, "Could not read ticket to auto-select product area");
                return None;
            }
        };

        let product = ticket.product_type()?;
        if !available.iter().any(|p| p == product) {
            debug!(product, "Ticket product area is not in the catalog");
            return None;
        }

        self.notifier
            .info(&format!("Product area '{product}' auto-selected."))
            .await;
        Some(product.to_string())
    }
}

fn decode_products(value: Value) -> Result<Vec<String>> {
    let Value::Array(items) = value else {
        return Err(Error::InvalidResponse(
            "Product areas response is not a list.".to_string(),
        ));
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        })
        .collect())
}
