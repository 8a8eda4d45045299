use colored::Colorize;

use crate::suite::SuiteReport;

pub fn print_suite_report(report: &SuiteReport, base_url: &str) {
    println!("{} {}", "Target:".bold(), base_url.cyan());

    for outcome in &report.outcomes {
        let verdict = if outcome.result.passed() {
            "PASS".green().bold()
        } else {
            "FAIL".red().bold()
        };
        println!(
            "{} {} {}",
            verdict,
            outcome.name.bold(),
            format!("{} {}", outcome.method.as_str(), outcome.path).dimmed()
        );

        for message in outcome.result.messages() {
            println!("  {}", message.red());
        }

        if !outcome.result.passed() {
            if let Some(response) = &outcome.result.response {
                println!("  {}", format!("captured status {}", response.status).dimmed());
            }
        }
    }

    let summary = format!(
        "{} passed, {} failed",
        report.passed_count(),
        report.failed_count()
    );
    if report.all_passed() {
        println!("{}", summary.green());
    } else {
        println!("{}", summary.red());
    }
}

pub fn print_scenario_names(names: &[String]) {
    for name in names {
        println!("{name}");
    }
}
