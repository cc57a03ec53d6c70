// Delivery channel adapters for expiry reminders

pub mod email;
pub mod push;

pub use email::ResendMailer;
pub use push::{VapidKeys, WebPushSender};
