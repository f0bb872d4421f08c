use crate::infra::{parse_date, seeded_memory_store};
use chrono::NaiveDate;
use clap::Args;
use recruitment::applications::{
    ApplicationService, ApplicationSubmission, ApplicationView, AvailabilityPeriod,
    CompetenceEntry, Identity, ReviewPolicy, StatusUpdateError,
};
use recruitment::error::AppError;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// First day of availability (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date, default_value = "2024-01-01")]
    pub(crate) from: NaiveDate,
    /// Last day of availability (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date, default_value = "2024-02-01")]
    pub(crate) to: NaiveDate,
    /// Years of experience claimed for the first seeded competence
    #[arg(long, default_value_t = 3.0)]
    pub(crate) years: f64,
    /// Forbid recruiters from reversing a decision
    #[arg(long)]
    pub(crate) lock_decisions: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        from,
        to,
        years,
        lock_decisions,
    } = args;

    let seeded = seeded_memory_store().await?;
    let competence = seeded.competences[0];
    let policy = ReviewPolicy {
        allow_decision_change: !lock_decisions,
    };
    let service = ApplicationService::new(Arc::new(seeded.store), policy);

    println!("Recruitment workflow demo");
    println!(
        "Applicant {} {} submits competence {competence} ({years} years) for {from} to {to}",
        seeded.applicant.name, seeded.applicant.surname
    );

    let submission = ApplicationSubmission {
        competencies: vec![CompetenceEntry {
            competence_id: competence,
            years_of_experience: years,
        }],
        periods: vec![AvailabilityPeriod {
            from_date: from,
            to_date: to,
        }],
    };
    let receipt = match service
        .submit(&Identity::Username(seeded.applicant.username.clone()), &submission)
        .await
    {
        Ok(receipt) => receipt,
        Err(err) => {
            println!("  submission rejected: {err}");
            return Ok(());
        }
    };
    println!(
        "  committed {} application(s), {} profile(s) created",
        receipt.applications.len(),
        receipt.profiles_created
    );

    let views = service.list().await?;
    println!("\nApplications visible to recruiters");
    for view in &views {
        render_view(view);
    }

    let id = receipt.applications[0];
    println!("\nRecruiter {} accepts with version 0", seeded.recruiter.username);
    match service.update_status(id, "accepted", 0).await {
        Ok(status) => println!(
            "  application {} is now {} (version {})",
            status.application_id, status.application_status, status.version_number
        ),
        Err(err) => println!("  update failed: {err}"),
    }

    println!("A second recruiter still holding version 0 tries to reject");
    match service.update_status(id, "rejected", 0).await {
        Ok(status) => println!(
            "  unexpectedly applied: {} (version {})",
            status.application_status, status.version_number
        ),
        Err(err @ StatusUpdateError::Conflict { .. }) => println!("  conflict: {err}"),
        Err(err) => println!("  update failed: {err}"),
    }

    if let Some(view) = service.get(id).await? {
        println!("\nFinal state");
        render_view(&view);
    }

    Ok(())
}

fn render_view(view: &ApplicationView) {
    println!(
        "- #{} {} {} | {} to {} | status {} | version {}",
        view.application_id,
        view.applicant.name,
        view.applicant.surname,
        view.from_date,
        view.to_date,
        view.application_status,
        view.version_number
    );
    for profile in &view.applicant.competence_profiles {
        let names: Vec<String> = profile
            .translations
            .iter()
            .map(|t| format!("{}: {}", t.language, t.translation))
            .collect();
        println!(
            "    competence {} ({} years) [{}]",
            profile.competence_id,
            profile.years_of_experience,
            names.join(", ")
        );
    }
}
