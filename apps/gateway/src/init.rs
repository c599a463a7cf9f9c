// Initialization helpers (one-time startup tasks)
//
// The hub never writes user data at runtime — the Persistence Adapter is read-only
// by design. `seed_dev_data` exists only so the hub is exercisable without a separate
// provisioning step: it populates a handful of users/teams from a seed file (or a
// small built-in default) the first time the database is empty.
use crate::state::AppState;
use anyhow::{Context, Result};
use domain::{Team, User};

/// Format, one record per line: `team_id,team_name` under `[teams]` and
/// `user_id,email,display_name,team_id` under `[users]`. See the built-in
/// DEFAULT_SEED below for the exact shape.
pub fn seed_dev_data(state: &AppState) -> Result<()> {
    let seed_path = std::env::var("HUB_SEED_FILE").unwrap_or_else(|_| "./data/seed.txt".to_string());
    let text = std::fs::read_to_string(&seed_path).unwrap_or_else(|_| DEFAULT_SEED.to_string());

    let mut section = "";
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            section = match name {
                "teams" => "teams",
                "users" => "users",
                _ => "",
            };
            continue;
        }
        match section {
            "teams" => {
                let mut parts = line.splitn(2, ',');
                let id = parts.next().unwrap_or("").trim();
                let name = parts.next().unwrap_or("").trim();
                if id.is_empty() {
                    continue;
                }
                state
                    .storage
                    .put_team(&Team {
                        id: id.to_string(),
                        name: name.to_string(),
                    })
                    .with_context(|| format!("seeding team {id}"))?;
            }
            "users" => {
                let mut parts = line.splitn(4, ',');
                let id = parts.next().unwrap_or("").trim();
                let email = parts.next().unwrap_or("").trim();
                let display_name = parts.next().unwrap_or("").trim();
                let team_id = parts.next().unwrap_or("").trim();
                if id.is_empty() {
                    continue;
                }
                state
                    .storage
                    .put_user(&User {
                        id: id.to_string(),
                        email: email.to_string(),
                        display_name: display_name.to_string(),
                        team_id: team_id.to_string(),
                    })
                    .with_context(|| format!("seeding user {id}"))?;
            }
            _ => {}
        }
    }

    tracing::info!(seed_path = %seed_path, "dev data seeded");
    Ok(())
}

const DEFAULT_SEED: &str = "\
[teams]
acme,Acme Corp

[users]
u-ada,ada@example.com,Ada,acme
u-grace,grace@example.com,Grace,acme
";
