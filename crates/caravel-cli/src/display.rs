//! Display formatting for CLI output.

use chrono::{DateTime, Utc};
use console::{style, StyledObject};

use caravel_deploy::{ConditionStatus, Release, ReleaseState};

/// Styled state name for terminal output
pub fn styled_state(state: &ReleaseState) -> StyledObject<String> {
    let name = state.status_name().to_string();
    match state {
        ReleaseState::Active => style(name).green(),
        ReleaseState::Degraded { .. } => style(name).red().bold(),
        ReleaseState::Superseded | ReleaseState::Absent => style(name).dim(),
        _ => style(name).yellow(),
    }
}

/// `2h`, `3d`, `15s` style age display
pub fn format_age(timestamp: DateTime<Utc>) -> String {
    let elapsed = Utc::now().signed_duration_since(timestamp);
    if elapsed.num_days() > 0 {
        format!("{}d", elapsed.num_days())
    } else if elapsed.num_hours() > 0 {
        format!("{}h", elapsed.num_hours())
    } else if elapsed.num_minutes() > 0 {
        format!("{}m", elapsed.num_minutes())
    } else {
        format!("{}s", elapsed.num_seconds().max(0))
    }
}

/// Full status block for one release
pub fn print_release(release: &Release) {
    println!("{}: {}", style("Name").bold(), release.name);
    println!("{}: {}", style("Version").bold(), release.version);
    println!("{}: {}", style("State").bold(), styled_state(&release.state));
    if let ReleaseState::Degraded {
        last_applied_index,
        reason,
    } = &release.state
    {
        match last_applied_index {
            Some(i) => println!(
                "  halted after resource {i}: {}",
                style(reason).red()
            ),
            None => println!("  halted before any resource applied: {}", style(reason).red()),
        }
    }
    println!(
        "{}: {}",
        style("Updated").bold(),
        format_age(release.updated_at)
    );

    if !release.conditions.is_empty() {
        println!("{}:", style("Resources").bold());
        for condition in &release.conditions {
            let marker = match condition.status {
                ConditionStatus::Applied => style("✓".to_string()).green(),
                ConditionStatus::Unchanged => style("=".to_string()).dim(),
                ConditionStatus::Deleted => style("-".to_string()).dim(),
                ConditionStatus::Failed => style("✗".to_string()).red(),
                ConditionStatus::Pending => style("·".to_string()).dim(),
            };
            match &condition.message {
                Some(message) => {
                    println!("  {marker} {} ({}): {message}", condition.resource, condition.status)
                }
                None => println!("  {marker} {} ({})", condition.resource, condition.status),
            }
        }
    }
}

/// One-line-per-release table
pub fn print_release_table(releases: &[Release]) {
    if releases.is_empty() {
        println!("No releases found");
        return;
    }
    println!(
        "{:<24} {:>8}  {:<12} {:>8}",
        style("NAME").bold(),
        style("VERSION").bold(),
        style("STATE").bold(),
        style("UPDATED").bold()
    );
    for release in releases {
        println!(
            "{:<24} {:>8}  {:<12} {:>8}",
            release.name,
            release.version,
            styled_state(&release.state),
            format_age(release.updated_at)
        );
    }
}

/// Version-per-line history table for one release
pub fn print_history(releases: &[Release]) {
    println!(
        "{:>8}  {:<12} {:>8}",
        style("VERSION").bold(),
        style("STATE").bold(),
        style("UPDATED").bold()
    );
    for release in releases {
        println!(
            "{:>8}  {:<12} {:>8}",
            release.version,
            styled_state(&release.state),
            format_age(release.updated_at)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_age_units() {
        assert_eq!(format_age(Utc::now()), "0s");
        assert_eq!(format_age(Utc::now() - Duration::minutes(5)), "5m");
        assert_eq!(format_age(Utc::now() - Duration::hours(3)), "3h");
        assert_eq!(format_age(Utc::now() - Duration::days(2)), "2d");
    }
}
