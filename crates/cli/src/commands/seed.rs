use enrollment_db::{connect, migrations, DemoCatalogSeed, SeedResult};

use crate::commands::{
    async_runtime, load_config, CommandResult, EXIT_DB_CONNECTIVITY, EXIT_MIGRATION,
    EXIT_VERIFICATION,
};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match async_runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DB_CONNECTIVITY))?;

        let run_result = async {
            migrations::run_pending(&pool)
                .await
                .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;

            let seeded = DemoCatalogSeed::load(&pool)
                .await
                .map_err(|error| ("seed_execution", error.to_string(), EXIT_MIGRATION))?;

            let verification = DemoCatalogSeed::verify(&pool)
                .await
                .map_err(|error| ("seed_verification", error.to_string(), EXIT_VERIFICATION))?;
            if !verification.all_present {
                let failed = verification
                    .checks
                    .iter()
                    .filter_map(|(check, present)| (!present).then_some(check.as_str()))
                    .collect::<Vec<_>>();
                return Err(("seed_verification", verification_message(&failed), EXIT_VERIFICATION));
            }
            Ok::<SeedResult, (&'static str, String, u8)>(seeded)
        }
        .await;

        pool.close().await;
        run_result
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", success_message(&seeded)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn success_message(seeded: &SeedResult) -> String {
    format!(
        "demo catalog loaded and verified: {} degrees, {} courses",
        seeded.degrees, seeded.courses
    )
}

fn verification_message(failed: &[&str]) -> String {
    if failed.is_empty() {
        "some catalog records failed to load".to_string()
    } else {
        format!("catalog verification failed for: {}", failed.join(", "))
    }
}
