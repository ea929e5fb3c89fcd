use async_trait::async_trait;
use eyre::Result;
use std::io::Write;

use super::{Command, DeskApp};
use desk_assist_core::catalog::ProductCatalog;

pub struct ProductsCommand {
    pub app: DeskApp,
    /// Mark the open ticket's product area, if there is a ticket.
    pub mark_ticket: bool,
}

#[async_trait]
impl Command for ProductsCommand {
    async fn execute(&self) -> Result<()> {
        let catalog = ProductCatalog::new(
            self.app.host.clone(),
            self.app.config.templates.product_types.clone(),
        );
        let products = catalog.load().await?;
        let selected = if self.mark_ticket {
            catalog.auto_select(&products).await
        } else {
            None
        };

        let mut stdout = std::io::stdout();
        if products.is_empty() {
            writeln!(stdout, "No product areas available.")?;
            return Ok(());
        }
        for product in &products {
            let marker = if selected.as_ref() == Some(product) { "*" } else { " " };
            writeln!(stdout, "{marker} {product}")?;
        }
        Ok(())
    }
}
