use enrollment_core::config::{AppConfig, LoadOptions};
use enrollment_db::{connect, DbPool};
use serde::Serialize;

use crate::commands::{
    async_runtime, CommandResult, EXIT_CONFIG, EXIT_DB_CONNECTIVITY, EXIT_VERIFICATION,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    command: &'static str,
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = exit_code(&report);

    if json_output {
        let output = serde_json::to_string(&report).unwrap_or_else(|error| {
            format!(
                "{{\"command\":\"doctor\",\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult { exit_code, output };
    }

    let message = render_human(&report);
    match failing_class(&report) {
        None => CommandResult::success("doctor", message),
        Some(error_class) => CommandResult::failure("doctor", error_class, message, exit_code),
    }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass("config_validation", "configuration loaded and validated"));
            checks.push(check_notification(&config));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            for name in ["notification_readiness", "database_connectivity", "catalog_presence"] {
                checks.push(DoctorCheck::skipped(name, "configuration did not load"));
            }
        }
    }

    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { command: "doctor", overall_status, summary, checks }
}

fn check_notification(config: &AppConfig) -> DoctorCheck {
    let notification = &config.notification;
    if !notification.enabled {
        return DoctorCheck::pass(
            "notification_readiness",
            "notification disabled; confirmations are only logged",
        );
    }
    let recipients = if notification.operator_email.is_some() {
        "contact and operator"
    } else {
        "contact only"
    };
    DoctorCheck::pass(
        "notification_readiness",
        format!(
            "webhook `{}` configured, delivering to {recipients}",
            notification.webhook_url.as_deref().unwrap_or_default()
        ),
    )
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match async_runtime("doctor") {
        Ok(runtime) => runtime,
        Err(_) => {
            return vec![
                DoctorCheck::fail("database_connectivity", "failed to initialize async runtime"),
                DoctorCheck::skipped("catalog_presence", "the async runtime did not start"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::skipped("catalog_presence", "the database is unreachable"),
                ];
            }
        };

        let checks = vec![
            DoctorCheck::pass(
                "database_connectivity",
                format!("connected using `{}`", config.database.url),
            ),
            check_catalog(&pool).await,
        ];
        pool.close().await;
        checks
    })
}

async fn check_catalog(pool: &DbPool) -> DoctorCheck {
    let counts = sqlx::query_as::<_, (i64, i64)>(
        "SELECT (SELECT COUNT(*) FROM degree), (SELECT COUNT(*) FROM course)",
    )
    .fetch_one(pool)
    .await;

    match counts {
        Ok((0, _)) => {
            DoctorCheck::fail("catalog_presence", "catalog is empty; run `enrollment seed`")
        }
        Ok((degrees, courses)) => DoctorCheck::pass(
            "catalog_presence",
            format!("{degrees} degrees and {courses} courses available"),
        ),
        Err(error) => DoctorCheck::fail(
            "catalog_presence",
            format!("catalog tables unavailable ({error}); run `enrollment migrate`"),
        ),
    }
}

fn failing_class(report: &DoctorReport) -> Option<&'static str> {
    report.checks.iter().find(|check| check.status == CheckStatus::Fail).map(|check| {
        match check.name {
            "config_validation" => "config_validation",
            "database_connectivity" => "db_connectivity",
            _ => "verification",
        }
    })
}

fn exit_code(report: &DoctorReport) -> u8 {
    match failing_class(report) {
        None => 0,
        Some("config_validation") => EXIT_CONFIG,
        Some("db_connectivity") => EXIT_DB_CONNECTIVITY,
        Some(_) => EXIT_VERIFICATION,
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::{exit_code, failing_class, render_human, CheckStatus, DoctorCheck, DoctorReport};

    fn report(checks: Vec<DoctorCheck>) -> DoctorReport {
        DoctorReport {
            command: "doctor",
            overall_status: CheckStatus::Fail,
            summary: "doctor: one or more readiness checks failed".to_string(),
            checks,
        }
    }

    #[test]
    fn first_failing_check_selects_the_exit_code() {
        let report = report(vec![
            DoctorCheck::pass("config_validation", "ok"),
            DoctorCheck::fail("database_connectivity", "refused"),
            DoctorCheck::skipped("catalog_presence", "the database is unreachable"),
        ]);

        assert_eq!(failing_class(&report), Some("db_connectivity"));
        assert_eq!(exit_code(&report), 4);
    }

    #[test]
    fn empty_catalog_is_a_verification_failure() {
        let report = report(vec![
            DoctorCheck::pass("config_validation", "ok"),
            DoctorCheck::pass("database_connectivity", "ok"),
            DoctorCheck::fail("catalog_presence", "catalog is empty"),
        ]);

        assert_eq!(exit_code(&report), 6);
    }

    #[test]
    fn human_rendering_marks_each_check() {
        let rendered = render_human(&report(vec![
            DoctorCheck::pass("config_validation", "loaded"),
            DoctorCheck::skipped("catalog_presence", "configuration did not load"),
        ]));

        assert!(rendered.contains("- [ok] config_validation: loaded"));
        assert!(rendered
            .contains("- [skip] catalog_presence: skipped because configuration did not load"));
    }
}
