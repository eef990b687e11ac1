use rusqlite::{params, Connection};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::GrocerError;

pub struct Database {
    conn: Mutex<Connection>,
}

/// Run a synchronous database closure on the blocking pool.
pub async fn call_blocking<T, F>(db: Arc<Database>, f: F) -> Result<T, GrocerError>
where
    T: Send + 'static,
    F: FnOnce(&Database) -> Result<T, GrocerError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(db.as_ref()))
        .await
        .map_err(|e| GrocerError::Internal(format!("DB task join error: {e}")))?
}

pub fn token_hash(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    fn from_str(s: &str) -> ChatRole {
        match s {
            "assistant" => ChatRole::Assistant,
            _ => ChatRole::User,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    pub user_id: i64,
    pub session_id: String,
    pub role: ChatRole,
    pub message_text: String,
    pub category: String,
    pub metadata: Option<serde_json::Value>,
    pub response_time_ms: Option<i64>,
    pub created_at: String,
}

#[derive(Clone, Debug)]
pub struct NewChatMessage {
    pub user_id: i64,
    pub session_id: String,
    pub role: ChatRole,
    pub message_text: String,
    pub category: String,
    pub metadata: Option<serde_json::Value>,
    pub response_time_ms: Option<i64>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub category: String,
    pub message_count: i64,
    pub first_message_at: String,
    pub last_message_at: String,
}

#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

#[derive(Clone, Debug)]
pub struct ShoppedItem {
    pub name: String,
    pub category_name: Option<String>,
    pub quantity: i64,
}

#[derive(Clone, Debug)]
pub struct CandidateProduct {
    pub name: String,
    pub description: Option<String>,
    pub category_name: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularQuery {
    pub query: String,
    pub count: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalytics {
    pub total_interactions: i64,
    pub today_interactions: i64,
    pub unique_users: i64,
    pub total_sessions: i64,
    pub avg_response_time_ms: Option<f64>,
    pub popular_queries: Vec<PopularQuery>,
    pub orphaned_user_turns: i64,
}

impl Database {
    pub fn new(data_dir: &str) -> Result<Self, GrocerError> {
        let db_path = Path::new(data_dir).join("grocerai.db");
        std::fs::create_dir_all(data_dir)?;

        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                role TEXT NOT NULL DEFAULT 'customer',
                token_hash TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT,
                category_id INTEGER,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS orders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS order_items (
                order_id INTEGER NOT NULL,
                product_id INTEGER NOT NULL,
                quantity INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS cart_items (
                user_id INTEGER NOT NULL,
                product_id INTEGER NOT NULL,
                quantity INTEGER NOT NULL DEFAULT 1,
                PRIMARY KEY (user_id, product_id)
            );

            CREATE TABLE IF NOT EXISTS ai_chat_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                message_text TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT 'general',
                metadata TEXT,
                response_time_ms INTEGER,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chat_history_user_session
                ON ai_chat_history(user_id, session_id, created_at);

            CREATE TABLE IF NOT EXISTS ai_recommendations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                recommendations TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ai_daily_analytics (
                date TEXT PRIMARY KEY,
                total_interactions INTEGER NOT NULL DEFAULT 0,
                unique_users INTEGER NOT NULL DEFAULT 0,
                avg_response_time_ms REAL,
                popular_queries TEXT,
                updated_at TEXT NOT NULL
            );",
        )?;

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    // --- Users ---

    pub fn create_user(
        &self,
        name: &str,
        email: &str,
        role: &str,
        token: &str,
    ) -> Result<i64, GrocerError> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO users (name, email, role, token_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name, email, role, token_hash(token), now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_user_by_token_hash(&self, hash: &str) -> Result<Option<AuthUser>, GrocerError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT id, name, email, role FROM users WHERE token_hash = ?1",
            params![hash],
            |row| {
                Ok(AuthUser {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    role: row.get(3)?,
                })
            },
        );
        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // --- Chat history ---

    pub fn save_chat_message(&self, msg: &NewChatMessage) -> Result<i64, GrocerError> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        let metadata = msg
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        conn.execute(
            "INSERT INTO ai_chat_history
                (user_id, session_id, role, message_text, category, metadata, response_time_ms, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                msg.user_id,
                msg.session_id,
                msg.role.as_str(),
                msg.message_text,
                msg.category,
                metadata,
                msg.response_time_ms,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Chat history for a user, newest first, optionally scoped to a session.
    pub fn get_user_chat_history(
        &self,
        user_id: i64,
        limit: usize,
        session_id: Option<&str>,
    ) -> Result<Vec<ChatMessage>, GrocerError> {
        let conn = self.conn.lock().unwrap();
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<ChatMessage> {
            let role: String = row.get(3)?;
            let metadata: Option<String> = row.get(6)?;
            Ok(ChatMessage {
                id: row.get(0)?,
                user_id: row.get(1)?,
                session_id: row.get(2)?,
                role: ChatRole::from_str(&role),
                message_text: row.get(4)?,
                category: row.get(5)?,
                metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
                response_time_ms: row.get(7)?,
                created_at: row.get(8)?,
            })
        };

        let messages = match session_id {
            Some(session) => {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, session_id, role, message_text, category, metadata, response_time_ms, created_at
                     FROM ai_chat_history
                     WHERE user_id = ?1 AND session_id = ?2
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?3",
                )?;
                let rows = stmt.query_map(params![user_id, session, limit as i64], map_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, session_id, role, message_text, category, metadata, response_time_ms, created_at
                     FROM ai_chat_history
                     WHERE user_id = ?1
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![user_id, limit as i64], map_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(messages)
    }

    /// Session summaries for a user, most recently active first.
    pub fn get_user_chat_sessions(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<SessionSummary>, GrocerError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT session_id, category, COUNT(*) as message_count,
                    MIN(created_at) as first_message_at,
                    MAX(created_at) as last_message_at
             FROM ai_chat_history
             WHERE user_id = ?1
             GROUP BY session_id, category
             ORDER BY last_message_at DESC
             LIMIT ?2",
        )?;
        let sessions = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok(SessionSummary {
                    session_id: row.get(0)?,
                    category: row.get(1)?,
                    message_count: row.get(2)?,
                    first_message_at: row.get(3)?,
                    last_message_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// Delete all messages for a user, or only one session's. Irreversible.
    pub fn clear_chat_history(
        &self,
        user_id: i64,
        session_id: Option<&str>,
    ) -> Result<usize, GrocerError> {
        let conn = self.conn.lock().unwrap();
        let deleted = match session_id {
            Some(session) => conn.execute(
                "DELETE FROM ai_chat_history WHERE user_id = ?1 AND session_id = ?2",
                params![user_id, session],
            )?,
            None => conn.execute(
                "DELETE FROM ai_chat_history WHERE user_id = ?1",
                params![user_id],
            )?,
        };
        Ok(deleted)
    }

    /// Admin maintenance: delete one session across users.
    pub fn clear_session_history(&self, session_id: &str) -> Result<usize, GrocerError> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM ai_chat_history WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(deleted)
    }

    pub fn clear_all_chat_history(&self) -> Result<usize, GrocerError> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM ai_chat_history", [])?;
        Ok(deleted)
    }

    /// Reconciliation read: user turns with no assistant turn persisted after
    /// them in the same session. A provider failure between the two writes of
    /// a chat turn leaves exactly this shape behind.
    pub fn count_orphaned_user_turns(&self, user_id: Option<i64>) -> Result<i64, GrocerError> {
        let conn = self.conn.lock().unwrap();
        let sql = "SELECT COUNT(*) FROM ai_chat_history m
             WHERE m.role = 'user'
               AND (?1 IS NULL OR m.user_id = ?1)
               AND NOT EXISTS (
                   SELECT 1 FROM ai_chat_history a
                   WHERE a.user_id = m.user_id
                     AND a.session_id = m.session_id
                     AND a.role = 'assistant'
                     AND a.id > m.id
               )";
        let count = conn.query_row(sql, params![user_id], |row| row.get(0))?;
        Ok(count)
    }

    // --- Recommendations ---

    pub fn save_recommendation(
        &self,
        user_id: i64,
        recommendations_json: &str,
    ) -> Result<(i64, String), GrocerError> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO ai_recommendations (user_id, recommendations, created_at)
             VALUES (?1, ?2, ?3)",
            params![user_id, recommendations_json, now],
        )?;
        Ok((conn.last_insert_rowid(), now))
    }

    // --- Shopping data used by the recommender ---

    /// Distinct products from the user's delivered orders, newest orders first.
    pub fn recent_purchases(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<ShoppedItem>, GrocerError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT p.name, c.name, oi.quantity
             FROM order_items oi
             JOIN products p ON oi.product_id = p.id
             LEFT JOIN categories c ON p.category_id = c.id
             JOIN orders o ON oi.order_id = o.id
             WHERE o.user_id = ?1 AND o.status = 'delivered'
             ORDER BY o.created_at DESC
             LIMIT ?2",
        )?;
        let items = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok(ShoppedItem {
                    name: row.get(0)?,
                    category_name: row.get(1)?,
                    quantity: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn cart_contents(&self, user_id: i64) -> Result<Vec<ShoppedItem>, GrocerError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT p.name, c.name, ci.quantity
             FROM cart_items ci
             JOIN products p ON ci.product_id = p.id
             LEFT JOIN categories c ON p.category_id = c.id
             WHERE ci.user_id = ?1",
        )?;
        let items = stmt
            .query_map(params![user_id], |row| {
                Ok(ShoppedItem {
                    name: row.get(0)?,
                    category_name: row.get(1)?,
                    quantity: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Active products the user has neither bought (delivered) nor carted.
    pub fn candidate_products(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<CandidateProduct>, GrocerError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT p.name, p.description, c.name
             FROM products p
             LEFT JOIN categories c ON p.category_id = c.id
             WHERE p.is_active = 1
               AND p.id NOT IN (
                   SELECT oi.product_id FROM order_items oi
                   JOIN orders o ON oi.order_id = o.id
                   WHERE o.user_id = ?1 AND o.status = 'delivered'
                   UNION
                   SELECT ci.product_id FROM cart_items ci WHERE ci.user_id = ?1
               )
             ORDER BY p.created_at DESC
             LIMIT ?2",
        )?;
        let products = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok(CandidateProduct {
                    name: row.get(0)?,
                    description: row.get(1)?,
                    category_name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }

    /// Fallback pool: a random sample of candidates for when the provider
    /// path fails.
    pub fn random_candidates(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<CandidateProduct>, GrocerError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT p.name, p.description, c.name
             FROM products p
             LEFT JOIN categories c ON p.category_id = c.id
             WHERE p.is_active = 1
               AND p.id NOT IN (
                   SELECT oi.product_id FROM order_items oi
                   JOIN orders o ON oi.order_id = o.id
                   WHERE o.user_id = ?1 AND o.status = 'delivered'
                   UNION
                   SELECT ci.product_id FROM cart_items ci WHERE ci.user_id = ?1
               )
             ORDER BY RANDOM()
             LIMIT ?2",
        )?;
        let products = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok(CandidateProduct {
                    name: row.get(0)?,
                    description: row.get(1)?,
                    category_name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }

    // --- Catalog management (seed + tests) ---

    pub fn insert_category(&self, name: &str) -> Result<i64, GrocerError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("INSERT INTO categories (name) VALUES (?1)", params![name])?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_product(
        &self,
        name: &str,
        description: Option<&str>,
        category_id: Option<i64>,
    ) -> Result<i64, GrocerError> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO products (name, description, category_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![name, description, category_id, now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_order(&self, user_id: i64, status: &str) -> Result<i64, GrocerError> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO orders (user_id, status, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, status, now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn add_order_item(
        &self,
        order_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> Result<(), GrocerError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO order_items (order_id, product_id, quantity) VALUES (?1, ?2, ?3)",
            params![order_id, product_id, quantity],
        )?;
        Ok(())
    }

    pub fn set_cart_item(
        &self,
        user_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> Result<(), GrocerError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO cart_items (user_id, product_id, quantity)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, product_id) DO UPDATE SET quantity = ?3",
            params![user_id, product_id, quantity],
        )?;
        Ok(())
    }

    // --- Analytics ---

    /// Live overview across the whole message log. `today` is a UTC
    /// `YYYY-MM-DD` date string.
    pub fn get_ai_analytics(&self, today: &str) -> Result<AiAnalytics, GrocerError> {
        let conn = self.conn.lock().unwrap();
        let (total_interactions, unique_users, total_sessions): (i64, i64, i64) = conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT user_id), COUNT(DISTINCT session_id)
             FROM ai_chat_history WHERE role = 'assistant'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let today_interactions: i64 = conn.query_row(
            "SELECT COUNT(*) FROM ai_chat_history
             WHERE role = 'assistant' AND substr(created_at, 1, 10) = ?1",
            params![today],
            |row| row.get(0),
        )?;

        let avg_response_time_ms: Option<f64> = conn.query_row(
            "SELECT AVG(response_time_ms) FROM ai_chat_history WHERE role = 'assistant'",
            [],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT substr(message_text, 1, 100) as query, COUNT(*) as frequency
             FROM ai_chat_history
             WHERE role = 'user'
             GROUP BY query
             ORDER BY frequency DESC
             LIMIT 5",
        )?;
        let popular_queries = stmt
            .query_map([], |row| {
                Ok(PopularQuery {
                    query: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        drop(stmt);
        drop(conn);
        let orphaned_user_turns = self.count_orphaned_user_turns(None)?;

        Ok(AiAnalytics {
            total_interactions,
            today_interactions,
            unique_users,
            total_sessions,
            avg_response_time_ms,
            popular_queries,
            orphaned_user_turns,
        })
    }

    /// Recompute and upsert the daily aggregate row for `date` (UTC
    /// `YYYY-MM-DD`) from the message log.
    pub fn update_daily_analytics(&self, date: &str) -> Result<(), GrocerError> {
        let conn = self.conn.lock().unwrap();
        let (total_interactions, unique_users, avg_response_time_ms): (i64, i64, Option<f64>) =
            conn.query_row(
                "SELECT COUNT(*), COUNT(DISTINCT user_id), AVG(response_time_ms)
                 FROM ai_chat_history
                 WHERE role = 'assistant' AND substr(created_at, 1, 10) = ?1",
                params![date],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

        let mut stmt = conn.prepare(
            "SELECT substr(message_text, 1, 50) as query, COUNT(*) as frequency
             FROM ai_chat_history
             WHERE role = 'user' AND substr(created_at, 1, 10) = ?1
             GROUP BY query
             ORDER BY frequency DESC
             LIMIT 5",
        )?;
        let popular = stmt
            .query_map(params![date], |row| {
                Ok(PopularQuery {
                    query: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        let popular_json = serde_json::to_string(&popular)?;
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO ai_daily_analytics
                (date, total_interactions, unique_users, avg_response_time_ms, popular_queries, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(date) DO UPDATE SET
                total_interactions = ?2,
                unique_users = ?3,
                avg_response_time_ms = ?4,
                popular_queries = ?5,
                updated_at = ?6",
            params![
                date,
                total_interactions,
                unique_users,
                avg_response_time_ms,
                popular_json,
                now,
            ],
        )?;
        Ok(())
    }

    pub fn get_daily_analytics(
        &self,
        date: &str,
    ) -> Result<Option<(i64, i64, Option<f64>)>, GrocerError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT total_interactions, unique_users, avg_response_time_ms
             FROM ai_daily_analytics WHERE date = ?1",
            params![date],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        );
        match result {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
