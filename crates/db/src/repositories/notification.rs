use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use docusphere_core::domain::notification::{
    DeliveryChannels, DeliveryMethod, Frequency, Notifiable, Notification, NotificationId,
    NotificationType, UserNotificationPreference,
};
use docusphere_core::domain::user::UserId;

use super::{
    decode_error, parse_optional_timestamp, parse_timestamp, unknown_value, write_error,
    NotificationRepository, PreferenceRepository, RepositoryError,
};
use crate::DbPool;

const NOTIFICATION_COLUMNS: &str = "id, user_id, notification_type, title, message,
    notifiable_kind, notifiable_id, data_json, deliver_in_app, deliver_email, frequency,
    read_at, created_at";

pub struct SqlNotificationRepository {
    pool: DbPool,
}

impl SqlNotificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_notification_type(value: &str) -> Result<NotificationType, RepositoryError> {
    NotificationType::parse(value).ok_or_else(|| unknown_value("notification type", value))
}

fn parse_frequency(value: &str) -> Result<Frequency, RepositoryError> {
    Frequency::parse(value).ok_or_else(|| unknown_value("frequency", value))
}

fn row_to_notification(row: &SqliteRow) -> Result<Notification, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let user_id: String = row.try_get("user_id").map_err(decode_error)?;
    let notification_type: String = row.try_get("notification_type").map_err(decode_error)?;
    let title: String = row.try_get("title").map_err(decode_error)?;
    let message: String = row.try_get("message").map_err(decode_error)?;
    let notifiable_kind: Option<String> = row.try_get("notifiable_kind").map_err(decode_error)?;
    let notifiable_id: Option<String> = row.try_get("notifiable_id").map_err(decode_error)?;
    let data_json: String = row.try_get("data_json").map_err(decode_error)?;
    let deliver_in_app: bool = row.try_get("deliver_in_app").map_err(decode_error)?;
    let deliver_email: bool = row.try_get("deliver_email").map_err(decode_error)?;
    let frequency: String = row.try_get("frequency").map_err(decode_error)?;
    let read_at: Option<String> = row.try_get("read_at").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;

    let data = match serde_json::from_str::<Value>(&data_json)
        .map_err(|error| RepositoryError::Decode(format!("data_json: {error}")))?
    {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(RepositoryError::Decode(format!("data_json is not an object: {other}")))
        }
    };

    Ok(Notification {
        id: NotificationId(id),
        user_id: UserId(user_id),
        notification_type: parse_notification_type(&notification_type)?,
        title,
        message,
        notifiable: notifiable_kind.zip(notifiable_id).map(|(kind, id)| Notifiable { kind, id }),
        data,
        channels: DeliveryChannels { in_app: deliver_in_app, email: deliver_email },
        frequency: parse_frequency(&frequency)?,
        read_at: parse_optional_timestamp("read_at", read_at)?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

#[async_trait::async_trait]
impl NotificationRepository for SqlNotificationRepository {
    async fn find_by_id(
        &self,
        id: &NotificationId,
    ) -> Result<Option<Notification>, RepositoryError> {
        let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?");
        let row = sqlx::query(&sql).bind(&id.0).fetch_optional(&self.pool).await?;

        row.as_ref().map(row_to_notification).transpose()
    }

    async fn save(&self, notification: Notification) -> Result<(), RepositoryError> {
        let data_json = serde_json::to_string(&notification.data)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let (notifiable_kind, notifiable_id) = match &notification.notifiable {
            Some(notifiable) => (Some(notifiable.kind.clone()), Some(notifiable.id.clone())),
            None => (None, None),
        };

        sqlx::query(
            "INSERT INTO notifications (id, user_id, notification_type, title, message,
                                        notifiable_kind, notifiable_id, data_json,
                                        deliver_in_app, deliver_email, frequency, read_at,
                                        created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 read_at = excluded.read_at",
        )
        .bind(&notification.id.0)
        .bind(&notification.user_id.0)
        .bind(notification.notification_type.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notifiable_kind)
        .bind(notifiable_id)
        .bind(data_json)
        .bind(notification.channels.in_app)
        .bind(notification.channels.email)
        .bind(notification.frequency.as_str())
        .bind(notification.read_at.map(|timestamp| timestamp.to_rfc3339()))
        .bind(notification.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let filter = if unread_only { "AND read_at IS NULL" } else { "" };
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE user_id = ? {filter}
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql).bind(&user_id.0).fetch_all(&self.pool).await?;

        rows.iter().map(row_to_notification).collect()
    }

    async fn mark_all_read(
        &self,
        user_id: &UserId,
        read_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = ? WHERE user_id = ? AND read_at IS NULL",
        )
        .bind(read_at.to_rfc3339())
        .bind(&user_id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

pub struct SqlPreferenceRepository {
    pool: DbPool,
}

impl SqlPreferenceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_preference(row: &SqliteRow) -> Result<UserNotificationPreference, RepositoryError> {
    let user_id: String = row.try_get("user_id").map_err(decode_error)?;
    let notification_type: String = row.try_get("notification_type").map_err(decode_error)?;
    let delivery_method: String = row.try_get("delivery_method").map_err(decode_error)?;
    let frequency: String = row.try_get("frequency").map_err(decode_error)?;
    let enabled: bool = row.try_get("enabled").map_err(decode_error)?;

    Ok(UserNotificationPreference {
        user_id: UserId(user_id),
        notification_type: parse_notification_type(&notification_type)?,
        delivery_method: DeliveryMethod::parse(&delivery_method)
            .ok_or_else(|| unknown_value("delivery method", &delivery_method))?,
        frequency: parse_frequency(&frequency)?,
        enabled,
    })
}

#[async_trait::async_trait]
impl PreferenceRepository for SqlPreferenceRepository {
    async fn find(
        &self,
        user_id: &UserId,
        notification_type: NotificationType,
    ) -> Result<Option<UserNotificationPreference>, RepositoryError> {
        let row = sqlx::query(
            "SELECT user_id, notification_type, delivery_method, frequency, enabled
             FROM user_notification_preferences
             WHERE user_id = ? AND notification_type = ?",
        )
        .bind(&user_id.0)
        .bind(notification_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_preference).transpose()
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<UserNotificationPreference>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT user_id, notification_type, delivery_method, frequency, enabled
             FROM user_notification_preferences
             WHERE user_id = ?",
        )
        .bind(&user_id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut preferences = rows.iter().map(row_to_preference).collect::<Result<Vec<_>, _>>()?;
        preferences.sort_by_key(|preference| preference.notification_type);
        Ok(preferences)
    }

    async fn save(&self, preference: UserNotificationPreference) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO user_notification_preferences (user_id, notification_type,
                                                        delivery_method, frequency, enabled)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(user_id, notification_type) DO UPDATE SET
                 delivery_method = excluded.delivery_method,
                 frequency = excluded.frequency,
                 enabled = excluded.enabled",
        )
        .bind(&preference.user_id.0)
        .bind(preference.notification_type.as_str())
        .bind(preference.delivery_method.as_str())
        .bind(preference.frequency.as_str())
        .bind(preference.enabled)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(())
    }
}
