//! Student profile commands.

use anyhow::Result;
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum StudentCommands {
    /// List student profiles (admin)
    List {
        /// Maximum number of results
        #[arg(short, long, default_value = "30")]
        num: usize,
    },

    /// Show one student profile
    Show { student_id: String },

    /// Update the fields a student may edit
    Update {
        student_id: String,

        #[arg(long)]
        preferred_name: Option<String>,

        #[arg(long)]
        phone_number: Option<String>,

        #[arg(long)]
        personal_email: Option<String>,

        #[arg(long)]
        local_address: Option<String>,

        #[arg(long)]
        travel_time_hrs: Option<f64>,
    },

    /// Update identity fields (write admin)
    Identity {
        student_id: String,

        #[arg(long)]
        full_name: Option<String>,

        #[arg(long)]
        gender: Option<String>,

        #[arg(long)]
        enrollment_type: Option<String>,

        #[arg(long)]
        year_of_enrollment: Option<i32>,

        #[arg(long)]
        sutd_email: Option<String>,
    },

    /// Make a student a house guardian (write admin)
    SetHg { student_id: String },

    /// Revoke house guardian status (write admin)
    RevokeHg { student_id: String },
}

// ── API types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
struct StudentProfile {
    username: String,
    student_id: String,
    full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preferred_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    enrollment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    year_of_enrollment: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sutd_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    personal_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    local_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    travel_time_hrs: Option<f64>,
    #[serde(default)]
    is_house_guardian: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct StudentRow {
    #[tabled(rename = "Student ID")]
    student_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Enrolled")]
    enrolled: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "HG")]
    house_guardian: String,
}

impl From<&StudentProfile> for StudentRow {
    fn from(p: &StudentProfile) -> Self {
        let dash = || "-".to_string();
        Self {
            student_id: p.student_id.clone(),
            name: p.preferred_name.clone().unwrap_or_else(|| p.full_name.clone()),
            enrolled: p.year_of_enrollment.map(|y| y.to_string()).unwrap_or_else(dash),
            email: p.sutd_email.clone().unwrap_or_else(dash),
            house_guardian: if p.is_house_guardian { "yes" } else { "" }.to_string(),
        }
    }
}

#[derive(Serialize)]
struct EditableUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    preferred_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    personal_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    local_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    travel_time_hrs: Option<f64>,
}

#[derive(Serialize)]
struct IdentityUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enrollment_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    year_of_enrollment: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sutd_email: Option<String>,
}

fn print_profile(profile: &StudentProfile, format: OutputFormat) -> Result<()> {
    if !matches!(format, OutputFormat::Table) {
        return output::print_item(profile, format);
    }

    output::print_header(&format!("Student {}", profile.student_id));
    output::print_detail("Full name", &profile.full_name);
    let optional = [
        ("Preferred name", &profile.preferred_name),
        ("Gender", &profile.gender),
        ("Enrollment type", &profile.enrollment_type),
        ("SUTD email", &profile.sutd_email),
        ("Phone", &profile.phone_number),
        ("Personal email", &profile.personal_email),
        ("Local address", &profile.local_address),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            output::print_detail(label, value);
        }
    }
    if let Some(year) = profile.year_of_enrollment {
        output::print_detail("Year of enrollment", &year.to_string());
    }
    if let Some(hours) = profile.travel_time_hrs {
        output::print_detail("Travel time (hrs)", &hours.to_string());
    }
    output::print_flag("House guardian", profile.is_house_guardian);
    Ok(())
}

pub async fn execute(cmd: StudentCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        StudentCommands::List { num } => {
            let profiles: Vec<StudentProfile> =
                client.get(&format!("/api/students?num={}", num)).await?;
            match format {
                OutputFormat::Table => {
                    let rows: Vec<StudentRow> = profiles.iter().map(StudentRow::from).collect();
                    output::print_list(&rows, format)?;
                }
                _ => output::print_item(&profiles, format)?,
            }
        }

        StudentCommands::Show { student_id } => {
            let profile: StudentProfile =
                client.get(&format!("/api/students/{}", student_id)).await?;
            print_profile(&profile, format)?;
        }

        StudentCommands::Update {
            student_id,
            preferred_name,
            phone_number,
            personal_email,
            local_address,
            travel_time_hrs,
        } => {
            let body = EditableUpdate {
                preferred_name,
                phone_number,
                personal_email,
                local_address,
                travel_time_hrs,
            };
            let profile: StudentProfile = client
                .put(&format!("/api/students/{}", student_id), Some(&body))
                .await?;
            print_profile(&profile, format)?;
        }

        StudentCommands::Identity {
            student_id,
            full_name,
            gender,
            enrollment_type,
            year_of_enrollment,
            sutd_email,
        } => {
            let body = IdentityUpdate {
                full_name,
                gender,
                enrollment_type,
                year_of_enrollment,
                sutd_email,
            };
            let profile: StudentProfile = client
                .put(&format!("/api/students/{}/identity", student_id), Some(&body))
                .await?;
            print_profile(&profile, format)?;
        }

        StudentCommands::SetHg { student_id } => {
            let profile: StudentProfile = client
                .put(&format!("/api/students/{}/set_hg", student_id), None::<&()>)
                .await?;
            output::print_success(&format!("{} is now a house guardian", profile.student_id));
        }

        StudentCommands::RevokeHg { student_id } => {
            let profile: StudentProfile = client
                .put(&format!("/api/students/{}/revoke_hg", student_id), None::<&()>)
                .await?;
            output::print_success(&format!(
                "{} is no longer a house guardian",
                profile.student_id
            ));
        }
    }

    Ok(())
}
