use anyhow::Result;
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use paw_core::models::UserActivity;
use paw_core::service::PawService;

use super::helpers::print_json;
use crate::config::Config;

#[derive(Serialize)]
struct UserStatus {
    user: String,
    configured: bool,
    progress: bool,
    days: usize,
    first_date: Option<String>,
    last_date: Option<String>,
}

fn join_activity(config: &Config, activity: Vec<UserActivity>) -> Vec<UserStatus> {
    let mut statuses: Vec<UserStatus> = config
        .users
        .iter()
        .map(|u| UserStatus {
            user: u.name.clone(),
            configured: true,
            progress: u.progress.is_some(),
            days: 0,
            first_date: None,
            last_date: None,
        })
        .collect();

    for a in activity {
        let idx = match statuses.iter().position(|s| s.user == a.user) {
            Some(idx) => idx,
            None => {
                statuses.push(UserStatus {
                    user: a.user.clone(),
                    configured: false,
                    progress: false,
                    days: 0,
                    first_date: None,
                    last_date: None,
                });
                statuses.len() - 1
            }
        };
        let status = &mut statuses[idx];
        status.days = a.days;
        status.first_date = Some(a.first_date.format("%Y-%m-%d").to_string());
        status.last_date = Some(a.last_date.format("%Y-%m-%d").to_string());
    }
    statuses
}

pub(crate) fn cmd_users(svc: &PawService, config: &Config, json: bool) -> Result<()> {
    let statuses = join_activity(config, svc.get_user_activity()?);

    if json {
        return print_json(&statuses);
    }
    if statuses.is_empty() {
        eprintln!("No users configured and nothing stored yet.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "User")]
        user: String,
        #[tabled(rename = "Configured")]
        configured: &'static str,
        #[tabled(rename = "Progress")]
        progress: &'static str,
        #[tabled(rename = "Days")]
        days: usize,
        #[tabled(rename = "First")]
        first: String,
        #[tabled(rename = "Last")]
        last: String,
    }

    let yes_no = |b: bool| if b { "yes" } else { "no" };
    let rows: Vec<Row> = statuses
        .into_iter()
        .map(|s| Row {
            configured: yes_no(s.configured),
            progress: yes_no(s.progress),
            days: s.days,
            first: s.first_date.unwrap_or_else(|| "-".to_string()),
            last: s.last_date.unwrap_or_else(|| "-".to_string()),
            user: s.user,
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}
