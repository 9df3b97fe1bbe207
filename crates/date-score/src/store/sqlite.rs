use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use tracing::info;

use super::RepositoryError;
use crate::plans::domain::{
    CommentId, NewComment, NewPlan, PlanComment, PlanId, PlanMetadata, PlanSummary, RankedPlan,
    Target,
};
use crate::plans::repository::PlanRepository;
use crate::scoring::{deviation_scores, PopulationEntry, ScoreStore, ScoreUpdate, SubScores};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS date_plans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        plan TEXT NOT NULL,
        score INTEGER NOT NULL,
        comment TEXT NOT NULL,
        age TEXT NOT NULL DEFAULT '',
        occupation TEXT NOT NULL DEFAULT '',
        gender TEXT NOT NULL DEFAULT '',
        date_time TEXT NOT NULL DEFAULT '',
        date_number TEXT NOT NULL DEFAULT '',
        location TEXT NOT NULL DEFAULT '',
        cost TEXT NOT NULL DEFAULT '',
        additional_notes TEXT NOT NULL DEFAULT '',
        age_appropriateness_score INTEGER NOT NULL DEFAULT 50,
        cost_effectiveness_score INTEGER NOT NULL DEFAULT 50,
        creativity_score INTEGER NOT NULL DEFAULT 50,
        balance_score INTEGER NOT NULL DEFAULT 50,
        relationship_progress_score INTEGER NOT NULL DEFAULT 50,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_date_plans_score ON date_plans (score DESC, id ASC)",
    r#"
    CREATE TABLE IF NOT EXISTS user_comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date_plan_id INTEGER NOT NULL REFERENCES date_plans (id) ON DELETE CASCADE,
        username TEXT NOT NULL,
        comment TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_user_comments_plan ON user_comments (date_plan_id)",
    r#"
    CREATE TABLE IF NOT EXISTS comment_likes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        comment_id INTEGER NOT NULL REFERENCES user_comments (id) ON DELETE CASCADE,
        device_id TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (comment_id, device_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS plan_likes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date_plan_id INTEGER NOT NULL REFERENCES date_plans (id) ON DELETE CASCADE,
        device_id TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (date_plan_id, device_id)
    )
    "#,
];

const POPULATION_QUERY: &str = r#"
    SELECT id, age_appropriateness_score, cost_effectiveness_score,
           creativity_score, balance_score, relationship_progress_score
    FROM date_plans
    ORDER BY id
"#;

const SUMMARY_COLUMNS: &str = "p.id, p.plan, p.score, p.comment, p.age, p.occupation, p.gender, \
     p.date_time, p.date_number, p.location, p.cost, p.additional_notes";

/// Durable store backed by a SQLite pool.
#[derive(Clone)]
pub struct SqlitePlanStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: i64,
    plan: String,
    score: i32,
    comment: String,
    age: String,
    occupation: String,
    gender: String,
    date_time: String,
    date_number: String,
    location: String,
    cost: String,
    additional_notes: String,
}

impl From<SummaryRow> for PlanSummary {
    fn from(row: SummaryRow) -> Self {
        PlanSummary {
            id: PlanId(row.id),
            plan: row.plan,
            score: row.score,
            comment: row.comment,
            metadata: PlanMetadata {
                age: row.age,
                occupation: row.occupation,
                gender: row.gender,
                date_time: row.date_time,
                date_number: row.date_number,
                location: row.location,
                cost: row.cost,
                additional_notes: row.additional_notes,
            },
        }
    }
}

#[derive(sqlx::FromRow)]
struct GradeRow {
    id: i64,
    age_appropriateness_score: i32,
    cost_effectiveness_score: i32,
    creativity_score: i32,
    balance_score: i32,
    relationship_progress_score: i32,
}

impl GradeRow {
    fn sub_scores(&self) -> SubScores {
        SubScores {
            age_appropriateness: self.age_appropriateness_score,
            cost_effectiveness: self.cost_effectiveness_score,
            creativity: self.creativity_score,
            balance: self.balance_score,
            relationship_progress: self.relationship_progress_score,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RankingRow {
    #[sqlx(flatten)]
    summary: SummaryRow,
    #[sqlx(flatten)]
    grades: GradeRow,
    like_count: i64,
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    username: String,
    comment: String,
    created_at: DateTime<Utc>,
    like_count: i64,
}

/// `(table, key column)` holding likes for a target kind.
fn like_table(target: Target) -> (&'static str, &'static str) {
    match target {
        Target::Plan(_) => ("plan_likes", "date_plan_id"),
        Target::Comment(_) => ("comment_likes", "comment_id"),
    }
}

impl SqlitePlanStore {
    /// Open (creating if missing) the database at `url` and apply the schema.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        let store = Self::from_pool(pool);
        store.migrate().await?;
        info!(url, "sqlite plan store ready");
        Ok(store)
    }

    /// Private in-memory database on a single pinned connection.
    pub async fn in_memory() -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self::from_pool(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn population_entries(rows: &[GradeRow]) -> Vec<PopulationEntry> {
    rows.iter()
        .map(|row| PopulationEntry {
            id: PlanId(row.id),
            sub_scores: row.sub_scores(),
        })
        .collect()
}

/// Write every update on `conn`. The caller owns the surrounding transaction.
async fn write_scores(
    conn: &mut SqliteConnection,
    updates: &[ScoreUpdate],
) -> Result<(), RepositoryError> {
    for update in updates {
        let result = sqlx::query("UPDATE date_plans SET score = ? WHERE id = ?")
            .bind(update.score)
            .bind(update.id.0)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("date plan {}", update.id)));
        }
    }
    Ok(())
}

#[async_trait]
impl ScoreStore for SqlitePlanStore {
    async fn population(&self) -> Result<Vec<PopulationEntry>, RepositoryError> {
        let rows: Vec<GradeRow> = sqlx::query_as(POPULATION_QUERY)
            .fetch_all(&self.pool)
            .await?;
        Ok(population_entries(&rows))
    }

    async fn apply_scores(&self, updates: &[ScoreUpdate]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        // an early return drops `tx`, rolling back the rows already written
        write_scores(&mut *tx, updates).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn recalculate(&self) -> Result<usize, RepositoryError> {
        // IMMEDIATE takes the database write lock before the population read and
        // holds it through the commit, across every connection to the file.
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        let rows: Vec<GradeRow> = sqlx::query_as(POPULATION_QUERY)
            .fetch_all(&mut *tx)
            .await?;
        if rows.is_empty() {
            tx.commit().await?;
            return Ok(0);
        }

        let updates = deviation_scores(&population_entries(&rows));
        write_scores(&mut *tx, &updates).await?;
        tx.commit().await?;
        Ok(updates.len())
    }
}

#[async_trait]
impl PlanRepository for SqlitePlanStore {
    async fn insert_plan(&self, plan: NewPlan) -> Result<PlanId, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO date_plans
                (plan, score, comment, age, occupation, gender, date_time, date_number,
                 location, cost, additional_notes, age_appropriateness_score,
                 cost_effectiveness_score, creativity_score, balance_score,
                 relationship_progress_score, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&plan.plan)
        .bind(plan.provisional_score)
        .bind(&plan.comment)
        .bind(&plan.metadata.age)
        .bind(&plan.metadata.occupation)
        .bind(&plan.metadata.gender)
        .bind(&plan.metadata.date_time)
        .bind(&plan.metadata.date_number)
        .bind(&plan.metadata.location)
        .bind(&plan.metadata.cost)
        .bind(&plan.metadata.additional_notes)
        .bind(plan.sub_scores.age_appropriateness)
        .bind(plan.sub_scores.cost_effectiveness)
        .bind(plan.sub_scores.creativity)
        .bind(plan.sub_scores.balance)
        .bind(plan.sub_scores.relationship_progress)
        .bind(plan.created_at)
        .execute(&self.pool)
        .await?;

        Ok(PlanId(result.last_insert_rowid()))
    }

    async fn score(&self, id: PlanId) -> Result<Option<i32>, RepositoryError> {
        let score: Option<i32> = sqlx::query_scalar("SELECT score FROM date_plans WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(score)
    }

    async fn ranking(&self) -> Result<Vec<RankedPlan>, RepositoryError> {
        let query = format!(
            r#"
            SELECT {SUMMARY_COLUMNS},
                   p.age_appropriateness_score, p.cost_effectiveness_score,
                   p.creativity_score, p.balance_score, p.relationship_progress_score,
                   (SELECT COUNT(*) FROM plan_likes l WHERE l.date_plan_id = p.id) AS like_count
            FROM date_plans p
            ORDER BY p.score DESC, p.id ASC
            "#
        );
        let rows: Vec<RankingRow> = sqlx::query_as(&query).fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let sub_scores = row.grades.sub_scores();
                RankedPlan::new(row.summary.into(), sub_scores, row.like_count)
            })
            .collect())
    }

    async fn search(&self, keyword: &str) -> Result<Vec<PlanSummary>, RepositoryError> {
        let query = format!(
            r#"
            SELECT {SUMMARY_COLUMNS}
            FROM date_plans p
            WHERE instr(lower(p.plan), ?1) > 0
               OR instr(lower(p.comment), ?1) > 0
               OR instr(lower(p.additional_notes), ?1) > 0
            ORDER BY p.score DESC, p.id ASC
            "#
        );
        // lower() folds ASCII only, so the keyword is folded the same way
        let rows: Vec<SummaryRow> = sqlx::query_as(&query)
            .bind(keyword.to_ascii_lowercase())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(PlanSummary::from).collect())
    }

    async fn exists(&self, target: Target) -> Result<bool, RepositoryError> {
        let query = match target {
            Target::Plan(_) => "SELECT EXISTS (SELECT 1 FROM date_plans WHERE id = ?)",
            Target::Comment(_) => "SELECT EXISTS (SELECT 1 FROM user_comments WHERE id = ?)",
        };
        let found: i64 = sqlx::query_scalar(query)
            .bind(target.raw_id())
            .fetch_one(&self.pool)
            .await?;
        Ok(found != 0)
    }

    async fn insert_comment(&self, comment: NewComment) -> Result<CommentId, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_comments (date_plan_id, username, comment, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(comment.plan_id.0)
        .bind(&comment.username)
        .bind(&comment.comment)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await?;

        Ok(CommentId(result.last_insert_rowid()))
    }

    async fn comments(&self, plan_id: PlanId) -> Result<Vec<PlanComment>, RepositoryError> {
        let rows: Vec<CommentRow> = sqlx::query_as(
            r#"
            SELECT c.id, c.username, c.comment, c.created_at,
                   (SELECT COUNT(*) FROM comment_likes l WHERE l.comment_id = c.id) AS like_count
            FROM user_comments c
            WHERE c.date_plan_id = ?
            ORDER BY c.created_at DESC, c.id DESC
            "#,
        )
        .bind(plan_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PlanComment {
                id: CommentId(row.id),
                username: row.username,
                comment: row.comment,
                created_at: row.created_at,
                like_count: row.like_count,
            })
            .collect())
    }

    async fn add_like(&self, target: Target, device_id: &str) -> Result<bool, RepositoryError> {
        let (table, column) = like_table(target);
        let query = format!("INSERT OR IGNORE INTO {table} ({column}, device_id) VALUES (?, ?)");
        let result = sqlx::query(&query)
            .bind(target.raw_id())
            .bind(device_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_like(
        &self,
        target: Target,
        device_id: &str,
    ) -> Result<bool, RepositoryError> {
        let (table, column) = like_table(target);
        let query = format!("DELETE FROM {table} WHERE {column} = ? AND device_id = ?");
        let result = sqlx::query(&query)
            .bind(target.raw_id())
            .bind(device_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn has_liked(&self, target: Target, device_id: &str) -> Result<bool, RepositoryError> {
        let (table, column) = like_table(target);
        let query =
            format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE {column} = ? AND device_id = ?)");
        let liked: i64 = sqlx::query_scalar(&query)
            .bind(target.raw_id())
            .bind(device_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(liked != 0)
    }

    async fn like_count(&self, target: Target) -> Result<i64, RepositoryError> {
        let (table, column) = like_table(target);
        let query = format!("SELECT COUNT(*) FROM {table} WHERE {column} = ?");
        let count: i64 = sqlx::query_scalar(&query)
            .bind(target.raw_id())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
