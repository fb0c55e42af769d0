//! PostgreSQL-Implementierung des PluginKvRepository

use async_trait::async_trait;
use sqlx::Row;

use crate::models::PluginKvRecord;
use crate::postgres::pool::PostgresDb;
use crate::repository::{DbResult, PluginKvRepository, UpsertStrategie};

#[async_trait]
impl PluginKvRepository for PostgresDb {
    fn upsert_strategie(&self) -> UpsertStrategie {
        self.upsert
    }

    async fn upsert(&self, record: &PluginKvRecord) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO plugin_kv (pkey, pvalue) VALUES ($1, $2)
             ON CONFLICT (pkey) DO UPDATE SET pvalue = EXCLUDED.pvalue",
        )
        .bind(&record.schluessel)
        .bind(&record.wert)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn aktualisieren(&self, record: &PluginKvRecord) -> DbResult<u64> {
        let affected = sqlx::query("UPDATE plugin_kv SET pvalue = $1 WHERE pkey = $2")
            .bind(&record.wert)
            .bind(&record.schluessel)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected)
    }

    async fn einfuegen(&self, record: &PluginKvRecord) -> DbResult<()> {
        sqlx::query("INSERT INTO plugin_kv (pkey, pvalue) VALUES ($1, $2)")
            .bind(&record.schluessel)
            .bind(&record.wert)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn laden(&self, schluessel: &str) -> DbResult<Option<Vec<u8>>> {
        let row = sqlx::query("SELECT pvalue FROM plugin_kv WHERE pkey = $1")
            .bind(schluessel)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.try_get::<Vec<u8>, _>("pvalue"))
            .transpose()
            .map_err(Into::into)
    }

    async fn loeschen(&self, schluessel: &str) -> DbResult<bool> {
        let affected = sqlx::query("DELETE FROM plugin_kv WHERE pkey = $1")
            .bind(schluessel)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }
}
