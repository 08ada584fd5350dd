//! Registration and login commands.

use pickpack_storefront::Storefront;
use pickpack_storefront::api::types::{AuthResult, NewCustomer};
use secrecy::SecretString;

use super::CommandError;

/// Register a customer.
///
/// # Errors
///
/// Returns an error with the API's message if registration fails.
pub async fn register(
    store: &Storefront,
    first_name: String,
    last_name: String,
    email: String,
    password: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let customer = NewCustomer {
        first_name,
        last_name,
        email: Some(email),
        email_address: None,
        password: SecretString::from(password),
    };

    match store.register(&customer).await {
        AuthResult::Success(success) => {
            println!("{} ({})", success.message, success.user.display_name());
            Ok(())
        }
        AuthResult::Failure { message } => Err(CommandError::Rejected(message).into()),
    }
}

/// Log in and merge the guest cart.
///
/// # Errors
///
/// Returns an error with the API's message if login fails.
pub async fn login(
    store: &Storefront,
    email: &str,
    password: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let password = SecretString::from(password);

    match store.login(email, &password).await {
        AuthResult::Success(success) => {
            println!("{} Welcome, {}.", success.message, success.user.display_name());
            println!("Cart: {} items", store.cart().get_count());
            Ok(())
        }
        AuthResult::Failure { message } => Err(CommandError::Rejected(message).into()),
    }
}

/// Log out.
pub async fn logout(store: &Storefront) {
    store.logout().await;
    println!("Logged out.");
}

/// Print the logged-in user.
pub fn whoami(store: &Storefront) {
    let auth = store.auth();
    match auth.current_user() {
        Some(user) => {
            let expiry = auth
                .token_expires_at()
                .map(|at| format!(", token expires {at}"))
                .unwrap_or_default();
            println!("{} ({}){expiry}", user.display_name(), user.id);
            if !auth.is_logged_in() {
                println!("(restored from persistent storage; log in again to start a session)");
            }
        }
        None => println!("Not logged in."),
    }
}
