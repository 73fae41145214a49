//! Built-in job handlers.
//!
//! Each handler computes its result from its input alone. They are the
//! stand-ins a deployment swaps for real work; what must stay stable is the
//! job name and the shape of the result object.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Job, JobError};

// ---- security_scan ----

#[derive(Debug, Deserialize)]
pub struct SecurityScanInput {
    #[serde(default)]
    pub target: Option<String>,
    /// Files or dependency names to inspect
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SecurityScanOutput {
    pub target: String,
    pub files_scanned: usize,
    pub vulnerabilities_found: usize,
    pub findings: Vec<String>,
    pub scan_status: &'static str,
}

/// Flags files that commonly carry secrets.
pub struct SecurityScanJob;

const SENSITIVE_SUFFIXES: [&str; 4] = [".env", ".pem", ".key", "id_rsa"];

#[async_trait]
impl Job for SecurityScanJob {
    type Input = SecurityScanInput;
    type Output = SecurityScanOutput;

    const JOB_TYPE: &'static str = "security_scan";

    async fn execute(&self, input: SecurityScanInput) -> Result<SecurityScanOutput, JobError> {
        let findings: Vec<String> = input
            .files
            .iter()
            .filter(|file| SENSITIVE_SUFFIXES.iter().any(|suffix| file.ends_with(suffix)))
            .map(|file| format!("sensitive file committed: {file}"))
            .collect();

        Ok(SecurityScanOutput {
            target: input.target.unwrap_or_else(|| "default".to_string()),
            files_scanned: input.files.len(),
            vulnerabilities_found: findings.len(),
            findings,
            scan_status: "completed",
        })
    }
}

// ---- code_generation ----

#[derive(Debug, Deserialize)]
pub struct CodeGenerationInput {
    #[serde(default)]
    pub prompt: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "typescript".to_string()
}

#[derive(Debug, Serialize)]
pub struct CodeGenerationOutput {
    pub language: String,
    pub files_generated: usize,
    pub lines_of_code: usize,
    pub generated_code: String,
}

pub struct CodeGenerationJob;

#[async_trait]
impl Job for CodeGenerationJob {
    type Input = CodeGenerationInput;
    type Output = CodeGenerationOutput;

    const JOB_TYPE: &'static str = "code_generation";

    async fn execute(&self, input: CodeGenerationInput) -> Result<CodeGenerationOutput, JobError> {
        let comment = match input.language.as_str() {
            "python" | "ruby" | "shell" => "#",
            "sql" => "--",
            _ => "//",
        };
        let generated_code: String = input
            .prompt
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| format!("{comment} generated: {}\n", line.trim()))
            .collect();

        Ok(CodeGenerationOutput {
            language: input.language,
            files_generated: usize::from(!generated_code.is_empty()),
            lines_of_code: generated_code.lines().count(),
            generated_code,
        })
    }
}

// ---- design_generation ----

#[derive(Debug, Deserialize)]
pub struct DesignGenerationInput {
    #[serde(default)]
    pub brief: String,
    #[serde(default = "default_variants")]
    pub variants: u32,
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_variants() -> u32 {
    3
}

fn default_format() -> String {
    "figma".to_string()
}

#[derive(Debug, Serialize)]
pub struct DesignGenerationOutput {
    pub variants_generated: u32,
    pub format: String,
    pub assets: Vec<String>,
}

pub struct DesignGenerationJob;

const MAX_DESIGN_VARIANTS: u32 = 10;

#[async_trait]
impl Job for DesignGenerationJob {
    type Input = DesignGenerationInput;
    type Output = DesignGenerationOutput;

    const JOB_TYPE: &'static str = "design_generation";

    async fn execute(&self, input: DesignGenerationInput) -> Result<DesignGenerationOutput, JobError> {
        if input.variants == 0 || input.variants > MAX_DESIGN_VARIANTS {
            return Err(JobError::permanent(format!(
                "variants must be between 1 and {MAX_DESIGN_VARIANTS}, got {}",
                input.variants
            )));
        }

        let slug: String = input
            .brief
            .split_whitespace()
            .take(4)
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join("-");
        let slug = if slug.is_empty() { "design".to_string() } else { slug };

        Ok(DesignGenerationOutput {
            variants_generated: input.variants,
            assets: (1..=input.variants)
                .map(|n| format!("{slug}-v{n}.{}", input.format))
                .collect(),
            format: input.format,
        })
    }
}

// ---- data_migration ----

#[derive(Debug, Deserialize)]
pub struct DataMigrationInput {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub records: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct DataMigrationOutput {
    pub source: String,
    pub destination: String,
    pub records_migrated: usize,
    pub records_skipped: usize,
    pub migration_status: &'static str,
}

/// Counts records that are objects as migrated, anything else as skipped.
pub struct DataMigrationJob;

#[async_trait]
impl Job for DataMigrationJob {
    type Input = DataMigrationInput;
    type Output = DataMigrationOutput;

    const JOB_TYPE: &'static str = "data_migration";

    async fn execute(&self, input: DataMigrationInput) -> Result<DataMigrationOutput, JobError> {
        let source = input.source.unwrap_or_else(|| "legacy".to_string());
        let destination = input.destination.unwrap_or_else(|| "primary".to_string());
        if source == destination {
            return Err(JobError::permanent("source and destination must differ"));
        }

        let records_migrated = input.records.iter().filter(|r| r.is_object()).count();

        Ok(DataMigrationOutput {
            source,
            destination,
            records_migrated,
            records_skipped: input.records.len() - records_migrated,
            migration_status: "completed",
        })
    }
}

// ---- backup_cleanup ----

#[derive(Debug, Deserialize)]
pub struct BackupEntry {
    pub id: String,
    pub age_days: u32,
}

#[derive(Debug, Deserialize)]
pub struct BackupCleanupInput {
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default)]
    pub backups: Vec<BackupEntry>,
}

fn default_retention_days() -> u32 {
    30
}

#[derive(Debug, Serialize)]
pub struct BackupCleanupOutput {
    pub retention_days: u32,
    pub backups_deleted: Vec<String>,
    pub backups_retained: usize,
}

/// Selects backups older than the retention window for deletion.
pub struct BackupCleanupJob;

#[async_trait]
impl Job for BackupCleanupJob {
    type Input = BackupCleanupInput;
    type Output = BackupCleanupOutput;

    const JOB_TYPE: &'static str = "backup_cleanup";

    async fn execute(&self, input: BackupCleanupInput) -> Result<BackupCleanupOutput, JobError> {
        let (expired, kept): (Vec<_>, Vec<_>) = input
            .backups
            .into_iter()
            .partition(|backup| backup.age_days > input.retention_days);

        Ok(BackupCleanupOutput {
            retention_days: input.retention_days,
            backups_deleted: expired.into_iter().map(|backup| backup.id).collect(),
            backups_retained: kept.len(),
        })
    }
}

// ---- health_check ----

#[derive(Debug, Deserialize)]
pub struct ServiceProbe {
    pub name: String,
    pub healthy: bool,
    #[serde(default)]
    pub response_time_ms: f64,
}

#[derive(Debug, Deserialize)]
pub struct HealthCheckInput {
    #[serde(default)]
    pub services: Vec<ServiceProbe>,
}

#[derive(Debug, Serialize)]
pub struct HealthCheckOutput {
    pub services_checked: usize,
    pub services_healthy: usize,
    pub unhealthy_services: Vec<String>,
    pub response_time_avg: f64,
    pub uptime_percentage: f64,
}

/// Summarizes service probes. With no probes everything counts as up.
pub struct HealthCheckJob;

#[async_trait]
impl Job for HealthCheckJob {
    type Input = HealthCheckInput;
    type Output = HealthCheckOutput;

    const JOB_TYPE: &'static str = "health_check";

    async fn execute(&self, input: HealthCheckInput) -> Result<HealthCheckOutput, JobError> {
        let checked = input.services.len();
        let healthy = input.services.iter().filter(|s| s.healthy).count();
        let unhealthy_services = input
            .services
            .iter()
            .filter(|s| !s.healthy)
            .map(|s| s.name.clone())
            .collect();

        let (response_time_avg, uptime_percentage) = if checked == 0 {
            (0.0, 100.0)
        } else {
            let total: f64 = input.services.iter().map(|s| s.response_time_ms).sum();
            (total / checked as f64, healthy as f64 * 100.0 / checked as f64)
        };

        Ok(HealthCheckOutput {
            services_checked: checked,
            services_healthy: healthy,
            unhealthy_services,
            response_time_avg,
            uptime_percentage,
        })
    }
}

// ---- email_send ----

#[derive(Debug, Deserialize)]
pub struct EmailSendInput {
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub subject: String,
}

#[derive(Debug, Serialize)]
pub struct EmailSendOutput {
    pub recipients: usize,
    pub accepted: Vec<String>,
    pub subject: String,
    pub delivery_status: &'static str,
}

pub struct EmailSendJob;

#[async_trait]
impl Job for EmailSendJob {
    type Input = EmailSendInput;
    type Output = EmailSendOutput;

    const JOB_TYPE: &'static str = "email_send";

    async fn execute(&self, input: EmailSendInput) -> Result<EmailSendOutput, JobError> {
        if input.to.is_empty() {
            return Err(JobError::permanent("email_send requires at least one recipient"));
        }
        if let Some(bad) = input.to.iter().find(|addr| !is_plausible_address(addr)) {
            return Err(JobError::permanent(format!("invalid recipient address: {bad}")));
        }

        Ok(EmailSendOutput {
            recipients: input.to.len(),
            accepted: input.to,
            subject: input.subject,
            delivery_status: "sent",
        })
    }
}

fn is_plausible_address(addr: &str) -> bool {
    match addr.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    }
}

// ---- webhook_process ----

#[derive(Debug, Deserialize)]
pub struct WebhookProcessInput {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Serialize)]
pub struct WebhookProcessOutput {
    pub event: String,
    pub fields_processed: usize,
    pub processed: bool,
}

pub struct WebhookProcessJob;

#[async_trait]
impl Job for WebhookProcessJob {
    type Input = WebhookProcessInput;
    type Output = WebhookProcessOutput;

    const JOB_TYPE: &'static str = "webhook_process";

    async fn execute(&self, input: WebhookProcessInput) -> Result<WebhookProcessOutput, JobError> {
        let fields_processed = match &input.payload {
            Value::Object(map) => map.len(),
            Value::Array(items) => items.len(),
            Value::Null => 0,
            _ => 1,
        };

        Ok(WebhookProcessOutput {
            event: input.event.unwrap_or_else(|| "unknown".to_string()),
            fields_processed,
            processed: true,
        })
    }
}
