//! DirectPay checkout commands.

use clap::Subcommand;
use pickpack_core::format_price;
use pickpack_storefront::Storefront;
use pickpack_storefront::payment::PaymentRequest;
use rust_decimal::Decimal;

use super::CommandError;

#[derive(Subcommand)]
pub enum PayAction {
    /// Build a signed checkout payload (defaults to the cart subtotal)
    Prepare {
        #[arg(short, long)]
        email: String,

        /// Amount in LKR; the cart subtotal when omitted
        #[arg(short, long)]
        amount: Option<Decimal>,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        return_url: Option<String>,

        #[arg(long)]
        response_url: Option<String>,

        /// Use the popup checkout instead of an inline container
        #[arg(long)]
        popup: bool,
    },
    /// Interpret a gateway response (JSON) and store it if successful
    Complete {
        /// Order ID the response belongs to
        #[arg(long)]
        order_id: String,

        /// Response JSON as returned by the checkout widget
        response: String,
    },
    /// Show the last stored successful payment
    Result,
    /// Forget the stored payment
    Clear,
}

/// Run a payment subcommand.
///
/// # Errors
///
/// Returns an error if the checkout cannot be prepared or the response is
/// not JSON.
pub fn run(store: &Storefront, action: PayAction) -> Result<(), Box<dyn std::error::Error>> {
    let payment = store.payment();

    match action {
        PayAction::Prepare {
            email,
            amount,
            first_name,
            last_name,
            phone,
            return_url,
            response_url,
            popup,
        } => {
            let amount = amount.unwrap_or_else(|| store.cart().subtotal());
            let request = PaymentRequest {
                first_name,
                last_name,
                phone,
                return_url,
                response_url,
                use_popup: popup,
                ..PaymentRequest::new(amount, email)
            };

            let init = payment.prepare_checkout(&request)?;
            println!("Order:  {} ({})", init.order_id, format_price(Some(amount)));
            println!("{}", serde_json::to_string_pretty(&init)?);
        }
        PayAction::Complete { order_id, response } => {
            let response: serde_json::Value = serde_json::from_str(&response)?;
            let outcome = payment.handle_response(Some(&response), &order_id);
            if !outcome.success {
                return Err(CommandError::Rejected(format!(
                    "{} ({})",
                    outcome.message, outcome.status
                ))
                .into());
            }
            println!("{}", outcome.message);
        }
        PayAction::Result => match payment.stored_result() {
            Some(outcome) => println!("{}", serde_json::to_string_pretty(&outcome)?),
            None => println!("No stored payment."),
        },
        PayAction::Clear => payment.clear_stored_result(),
    }
    Ok(())
}
