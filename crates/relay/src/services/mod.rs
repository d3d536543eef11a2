pub mod bot_service;
pub mod scanner_service;
pub mod telegram_service;
pub mod webhook_service;
