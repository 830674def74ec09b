use crate::postgres::PostgresConfig;
use anyhow::{bail, Result};
use tokio::process::Command;
use tracing::{debug, instrument};

/// Applies goose SQL migrations by running the goose binary
pub struct MigrationRunner {
    goose_binary_path: String,
    migrations_dir: String,
    dsn: String,
}

impl MigrationRunner {
    pub fn new(goose_binary_path: String, migrations_dir: String, dsn: String) -> Self {
        Self {
            goose_binary_path,
            migrations_dir,
            dsn,
        }
    }

    pub fn from_config(config: &PostgresConfig) -> Self {
        Self::new(
            config.goose_binary_path.clone(),
            config.migrations_dir.clone(),
            config.dsn(),
        )
    }

    /// Runs all pending migrations (`goose up`)
    #[instrument(skip(self), fields(migrations_dir = %self.migrations_dir))]
    pub async fn run_migrations(&self) -> Result<()> {
        let stdout = self.goose("up").await?;
        debug!("migrations completed successfully:\n{}", stdout);
        Ok(())
    }

    /// Returns goose's status report for the database
    pub async fn migration_status(&self) -> Result<String> {
        self.goose("status").await
    }

    async fn goose(&self, command: &str) -> Result<String> {
        let output = Command::new(&self.goose_binary_path)
            .arg("-dir")
            .arg(&self.migrations_dir)
            .arg("postgres")
            .arg(&self.dsn)
            .arg(command)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "goose {} failed.\nstdout: {}\nstderr: {}",
                command,
                stdout,
                stderr
            );
        }

        Ok(stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_goose_binary_fails() {
        let runner = MigrationRunner::new(
            "/nonexistent/goose-binary".to_string(),
            "migrations".to_string(),
            "postgres://localhost/none".to_string(),
        );

        assert!(runner.run_migrations().await.is_err());
    }
}
