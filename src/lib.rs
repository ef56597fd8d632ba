pub mod cli;
pub mod client;
pub mod clipboard;
pub mod console;
pub mod controller;
pub mod error;
pub mod models;
pub mod state;
pub mod store;
pub mod stream;

use cli::Args;
use clipboard::TerminalClipboard;
use controller::{ ChatController, UserProfile };
use log::info;
use std::error::Error;
use std::sync::Arc;
use store::SessionRepository;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Chat Service URL: {}", args.base_url);
    info!("User Name: {}", args.user_name);
    info!("Session Store Type: {}", args.store_type);
    match args.store_type.to_lowercase().as_str() {
        "file" => info!("Session Store Path: {}", args.store_path),
        "redis" => info!("Session Store Redis URL: {}", args.redis_url),
        _ => {}
    }
    info!("Session Store Key: {}", args.store_key);
    info!("Session Title Length: {}", args.title_length);
    info!("-------------------------");

    let service = client::new_service(&args)?;
    let store = store::create_store(&args)?;
    let profile = UserProfile {
        user_name: args.user_name.clone(),
        phone: args.phone.clone(),
    };

    let controller = ChatController::start(
        service,
        SessionRepository::new(store, args.store_key.clone()),
        Arc::new(TerminalClipboard),
        profile,
        args.title_length
    ).await;

    console::run(controller).await
}
