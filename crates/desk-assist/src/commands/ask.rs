use std::sync::Arc;

use async_trait::async_trait;
use eyre::{Result, eyre};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use super::{Command, DeskApp};
use crate::terminal::TerminalView;
use desk_assist_core::catalog::ProductCatalog;
use desk_assist_core::flows::{QueryFlow, QueryRequest};
use desk_assist_core::task::PollOutcome;

pub struct AskCommand {
    pub app: DeskApp,
    pub query: Option<String>,
    pub products: Vec<String>,
    pub with_ticket: bool,
    pub auto_product: bool,
}

#[async_trait]
impl Command for AskCommand {
    async fn execute(&self) -> Result<()> {
        let flow = QueryFlow::new(self.app.services(), Arc::new(TerminalView::new()));
        let products = self.product_filter().await;

        if let Some(query) = &self.query {
            return match self.ask(&flow, query, &products).await? {
                PollOutcome::Completed => Ok(()),
                PollOutcome::Failed => Err(eyre!("The assistant could not answer")),
                PollOutcome::Cancelled => Err(eyre!("Cancelled")),
            };
        }

        // One question per line; the conversation history carries across.
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Err(err) = self.ask(&flow, &line, &products).await {
                warn!(error = %err, "Question was not answered");
            }
        }
        Ok(())
    }
}

impl AskCommand {
    async fn ask(&self, flow: &QueryFlow, query: &str, products: &[String]) -> Result<PollOutcome> {
        let session = flow
            .submit(QueryRequest {
                query: query.to_string(),
                product_types: products.to_vec(),
                use_ticket_context: self.with_ticket,
            })
            .await?;

        let outcome = tokio::select! {
            outcome = session.wait() => outcome,
            _ = tokio::signal::ctrl_c() => {
                flow.cancel().await;
                PollOutcome::Cancelled
            }
        };
        Ok(outcome)
    }

    async fn product_filter(&self) -> Vec<String> {
        let mut products = self.products.clone();
        if !self.auto_product {
            return products;
        }

        let catalog = ProductCatalog::new(
            self.app.host.clone(),
            self.app.config.templates.product_types.clone(),
        );
        match catalog.load().await {
            Ok(available) => {
                if let Some(product) = catalog.auto_select(&available).await
                    && !products.contains(&product)
                {
                    products.push(product);
                }
            }
            Err(err) => warn!(error = %err, "Could not load product areas"),
        }
        products
    }
}
