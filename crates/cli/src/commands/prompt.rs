//! Interactive "Added to Cart" dialog on the terminal.

use std::io::{BufRead, Write};

use async_trait::async_trait;
use retail_cart_client::prompt::{ADDED_TITLE, CONTINUE_LABEL, VIEW_CART_LABEL};
use retail_cart_client::{ConfirmationChoice, ConfirmationPrompt};
use retail_cart_core::{Cart, format_price};

/// Asks on stdin/stdout. EOF or an unrecognized answer counts as dismissed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

#[async_trait]
impl ConfirmationPrompt for TerminalPrompt {
    async fn confirm_added(&self, cart: &Cart) -> Option<ConfirmationChoice> {
        let summary = format!(
            "{} item(s), subtotal {}",
            cart.total_quantity(),
            format_price(cart.subtotal())
        );

        let answer = tokio::task::spawn_blocking(move || ask(&summary)).await;
        match answer {
            Ok(Ok(line)) => parse_choice(&line),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Could not read confirmation answer");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Confirmation prompt task failed");
                None
            }
        }
    }
}

fn ask(summary: &str) -> std::io::Result<String> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "{ADDED_TITLE}: {summary}")?;
    write!(out, "[1] {CONTINUE_LABEL}  [2] {VIEW_CART_LABEL} > ")?;
    out.flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

/// Map a typed answer to a dialog choice.
fn parse_choice(answer: &str) -> Option<ConfirmationChoice> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "1" | "c" | "continue" => Some(ConfirmationChoice::ContinueShopping),
        "2" | "v" | "view" => Some(ConfirmationChoice::ViewCart),
        _ => None,
    }
}
