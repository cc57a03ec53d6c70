// Repository layer for database operations

pub mod medicine;
pub mod notification_log;
mod queries;
pub mod settings;

pub use medicine::MedicineRepository;
pub use notification_log::NotificationLogRepository;
pub use settings::SettingsRepository;
