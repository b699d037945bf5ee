//! SQLite database operations
//!
//! Local implementation of [`SocialBackend`]. Used for offline mode,
//! development and tests; mirrors the filtering of the hosted backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite, SqlitePool};
use std::path::Path;

use super::backend::SocialBackend;
use super::models::*;
use crate::error::AppError;
use crate::metrics::observe_backend;

const BACKEND_NAME: &str = "sqlite";

const RELATIONSHIP_SELECT: &str = r#"
    SELECT
        f.id, f.follower_id, f.following_id, f.status, f.created_at,
        fp.user_id AS fp_user_id, fp.username AS fp_username,
        fp.display_name AS fp_display_name, fp.avatar_url AS fp_avatar_url,
        fp.points AS fp_points,
        tp.user_id AS tp_user_id, tp.username AS tp_username,
        tp.display_name AS tp_display_name, tp.avatar_url AS tp_avatar_url,
        tp.points AS tp_points
    FROM follows f
    LEFT JOIN profiles fp ON fp.user_id = f.follower_id
    LEFT JOIN profiles tp ON tp.user_id = f.following_id
"#;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

/// Read a joined profile whose columns share `prefix`; `None` when the
/// LEFT JOIN found nothing.
fn profile_from_row(row: &SqliteRow, prefix: &str) -> Result<Option<Profile>, sqlx::Error> {
    let user_id: Option<String> = row.try_get(format!("{prefix}_user_id").as_str())?;
    let Some(user_id) = user_id else {
        return Ok(None);
    };

    Ok(Some(Profile {
        user_id,
        username: row.try_get(format!("{prefix}_username").as_str())?,
        display_name: row.try_get(format!("{prefix}_display_name").as_str())?,
        avatar_url: row.try_get(format!("{prefix}_avatar_url").as_str())?,
        points: row.try_get(format!("{prefix}_points").as_str())?,
    }))
}

fn follow_row_from_row(row: &SqliteRow) -> Result<FollowRow, AppError> {
    let status: String = row.try_get("status")?;
    let status = FollowRowStatus::parse(&status).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("unknown follow status in database: {status}"))
    })?;

    Ok(FollowRow {
        id: row.try_get("id")?,
        follower_id: row.try_get("follower_id")?,
        following_id: row.try_get("following_id")?,
        status,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        follower_profile: profile_from_row(row, "fp")?,
        following_profile: profile_from_row(row, "tp")?,
    })
}

fn recommendation_from_row(row: &SqliteRow) -> Result<Recommendation, AppError> {
    let media_type: String = row.try_get("media_type")?;
    let media_type = MediaType::parse(&media_type).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("unknown media type in database: {media_type}"))
    })?;

    Ok(Recommendation {
        id: row.try_get("id")?,
        sender_id: row.try_get("sender_id")?,
        recipient_id: row.try_get("recipient_id")?,
        media_id: row.try_get("media_id")?,
        media_type,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        is_read: row.try_get("is_read")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        sender_profile: profile_from_row(row, "sp")?,
    })
}

/// Escape LIKE wildcards so user input only matches literally.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

impl Database {
    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .inspect_err(|e| tracing::error!("Migration failed: {}", e))?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    /// Insert or update a profile
    pub async fn upsert_profile(&self, profile: &Profile) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, username, display_name, avatar_url, points)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                username = excluded.username,
                display_name = excluded.display_name,
                avatar_url = excluded.avatar_url,
                points = excluded.points
            "#,
        )
        .bind(&profile.user_id)
        .bind(&profile.username)
        .bind(&profile.display_name)
        .bind(&profile.avatar_url)
        .bind(profile.points)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a single follow row by (follower, following)
    pub async fn get_follow(
        &self,
        follower_id: &str,
        following_id: &str,
    ) -> Result<Option<FollowRow>, AppError> {
        let sql = format!("{RELATIONSHIP_SELECT} WHERE f.follower_id = ? AND f.following_id = ?");
        let row = sqlx::query(&sql)
            .bind(follower_id)
            .bind(following_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(follow_row_from_row).transpose()
    }
}

#[async_trait]
impl SocialBackend for Database {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn fetch_relationships(&self, user_id: &str) -> Result<Vec<FollowRow>, AppError> {
        observe_backend(BACKEND_NAME, "fetch_relationships", async {
            let sql = format!(
                "{RELATIONSHIP_SELECT} WHERE f.follower_id = ? OR f.following_id = ? ORDER BY f.created_at DESC"
            );
            let rows = sqlx::query(&sql)
                .bind(user_id)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

            rows.iter().map(follow_row_from_row).collect()
        })
        .await
    }

    async fn insert_follow(&self, follower_id: &str, following_id: &str) -> Result<(), AppError> {
        observe_backend(BACKEND_NAME, "insert_follow", async {
            sqlx::query(
                "INSERT INTO follows (id, follower_id, following_id, status, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(EntityId::new().0)
            .bind(follower_id)
            .bind(following_id)
            .bind(FollowRowStatus::Pending.as_str())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

            Ok(())
        })
        .await
    }

    async fn delete_follow(&self, follower_id: &str, following_id: &str) -> Result<(), AppError> {
        observe_backend(BACKEND_NAME, "delete_follow", async {
            let result =
                sqlx::query("DELETE FROM follows WHERE follower_id = ? AND following_id = ?")
                    .bind(follower_id)
                    .bind(following_id)
                    .execute(&self.pool)
                    .await?;

            if result.rows_affected() == 0 {
                tracing::debug!(follower_id, following_id, "No follow row to delete");
            }
            Ok(())
        })
        .await
    }

    async fn accept_follow(&self, row_id: &str, following_id: &str) -> Result<bool, AppError> {
        observe_backend(BACKEND_NAME, "accept_follow", async {
            let result =
                sqlx::query("UPDATE follows SET status = ? WHERE id = ? AND following_id = ?")
                    .bind(FollowRowStatus::Accepted.as_str())
                    .bind(row_id)
                    .bind(following_id)
                    .execute(&self.pool)
                    .await?;

            if result.rows_affected() == 0 {
                tracing::debug!(row_id, following_id, "No follow request to accept");
            }
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn delete_follow_request(
        &self,
        row_id: &str,
        following_id: &str,
    ) -> Result<(), AppError> {
        observe_backend(BACKEND_NAME, "delete_follow_request", async {
            sqlx::query("DELETE FROM follows WHERE id = ? AND following_id = ?")
                .bind(row_id)
                .bind(following_id)
                .execute(&self.pool)
                .await?;

            Ok(())
        })
        .await
    }

    async fn search_profiles(
        &self,
        query: &str,
        exclude_user_id: &str,
        limit: usize,
    ) -> Result<Vec<Profile>, AppError> {
        observe_backend(BACKEND_NAME, "search_profiles", async {
            let pattern = like_pattern(query);
            let rows = sqlx::query(
                r#"
                SELECT user_id, username, display_name, avatar_url, points
                FROM profiles
                WHERE user_id != ?
                  AND (username LIKE ? ESCAPE '\' OR display_name LIKE ? ESCAPE '\')
                ORDER BY username ASC
                LIMIT ?
                "#,
            )
            .bind(exclude_user_id)
            .bind(&pattern)
            .bind(&pattern)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

            let profiles = rows
                .iter()
                .map(|row| {
                    Ok(Profile {
                        user_id: row.try_get("user_id")?,
                        username: row.try_get("username")?,
                        display_name: row.try_get("display_name")?,
                        avatar_url: row.try_get("avatar_url")?,
                        points: row.try_get("points")?,
                    })
                })
                .collect::<Result<Vec<_>, sqlx::Error>>()?;

            Ok(profiles)
        })
        .await
    }

    async fn insert_recommendations(
        &self,
        recommendations: &[NewRecommendation],
    ) -> Result<(), AppError> {
        observe_backend(BACKEND_NAME, "insert_recommendations", async {
            let mut tx = self.pool.begin().await?;

            for recommendation in recommendations {
                sqlx::query(
                    r#"
                    INSERT INTO recommendations
                        (id, sender_id, recipient_id, media_id, media_type, title, message, created_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&recommendation.id)
                .bind(&recommendation.sender_id)
                .bind(&recommendation.recipient_id)
                .bind(recommendation.media_id)
                .bind(recommendation.media_type.as_str())
                .bind(&recommendation.title)
                .bind(&recommendation.message)
                .bind(recommendation.created_at)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok(())
        })
        .await
    }

    async fn list_recommendations(
        &self,
        recipient_id: &str,
        limit: usize,
    ) -> Result<Vec<Recommendation>, AppError> {
        observe_backend(BACKEND_NAME, "list_recommendations", async {
            let rows = sqlx::query(
                r#"
                SELECT
                    r.id, r.sender_id, r.recipient_id, r.media_id, r.media_type,
                    r.title, r.message, r.is_read, r.created_at,
                    sp.user_id AS sp_user_id, sp.username AS sp_username,
                    sp.display_name AS sp_display_name, sp.avatar_url AS sp_avatar_url,
                    sp.points AS sp_points
                FROM recommendations r
                LEFT JOIN profiles sp ON sp.user_id = r.sender_id
                WHERE r.recipient_id = ?
                ORDER BY r.created_at DESC
                LIMIT ?
                "#,
            )
            .bind(recipient_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

            rows.iter().map(recommendation_from_row).collect()
        })
        .await
    }

    async fn mark_recommendation_read(
        &self,
        id: &str,
        recipient_id: &str,
    ) -> Result<bool, AppError> {
        observe_backend(BACKEND_NAME, "mark_recommendation_read", async {
            let result =
                sqlx::query("UPDATE recommendations SET is_read = 1 WHERE id = ? AND recipient_id = ?")
                    .bind(id)
                    .bind(recipient_id)
                    .execute(&self.pool)
                    .await?;

            Ok(result.rows_affected() > 0)
        })
        .await
    }
}
