// SQL query constants shared by the repositories

/// SQL query fragments for medicines table
pub mod medicine_queries {
    pub const SELECT_ALL_COLUMNS: &str = r#"id, name, expiry_date, quantity, batch_number,
        notified, last_notification_date, created_at, updated_at"#;
}

/// SQL query fragments for the singleton notification_settings row
pub mod settings_queries {
    pub const SELECT_ALL_COLUMNS: &str = r#"email, enable_email_notifications,
        enable_push_notifications, enable_daily_notifications,
        enable_weekly_notifications, enable_monthly_notifications,
        notification_time, push_endpoint, push_p256dh, push_auth, updated_at"#;
}

/// SQL query fragments for notification_logs table
pub mod notification_log_queries {
    /// Columns qualified with the `l` alias so they can be joined with medicines
    pub const SELECT_ALL_COLUMNS: &str = r#"l.id, l.medicine_id, l.category, l.channel,
        l.status, l.message, l.sent_at"#;
}
