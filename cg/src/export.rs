//! Search result export

use std::io::Write;

use eyre::{Context, Result};
use tracing::debug;

use crate::api::{Group, User};

pub const CSV_HEADER: [&str; 5] = ["id", "first_name", "last_name", "email", "job_title"];
pub const GROUP_CSV_HEADER: [&str; 3] = ["id", "name", "description"];

/// Write users as CSV with a header row
pub fn write_users_csv<W: Write>(writer: W, users: &[User]) -> Result<()> {
    debug!(count = users.len(), "write_users_csv: called");
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(CSV_HEADER).context("Failed to write CSV header")?;

    for user in users {
        let id = user.id.to_string();
        csv.write_record([
            id.as_str(),
            user.first_name.as_deref().unwrap_or_default(),
            user.last_name.as_deref().unwrap_or_default(),
            user.email.as_deref().unwrap_or_default(),
            user.job_title.as_deref().unwrap_or_default(),
        ])
        .context("Failed to write CSV row")?;
    }

    csv.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// Write agent groups as CSV with a header row
pub fn write_groups_csv<W: Write>(writer: W, groups: &[Group]) -> Result<()> {
    debug!(count = groups.len(), "write_groups_csv: called");
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(GROUP_CSV_HEADER).context("Failed to write CSV header")?;

    for group in groups {
        let id = group.id.to_string();
        csv.write_record([
            id.as_str(),
            group.name.as_str(),
            group.description.as_deref().unwrap_or_default(),
        ])
        .context("Failed to write CSV row")?;
    }

    csv.flush().context("Failed to flush CSV output")?;
    Ok(())
}
